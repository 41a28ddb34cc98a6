//! # tandem-core
//!
//! Foundation types shared by every Tandem crate:
//!
//! - **Branded IDs**: [`ids::ConnectionId`] and the short uppercase [`ids::SessionCode`]
//! - **Timer**: [`timer::Timer`], the wall-clock countdown state machine
//! - **Clock**: [`clock::Clock`] seam with [`clock::SystemClock`] and [`clock::ManualClock`]
//! - **Protocol**: inbound [`protocol::ClientCommand`] and outbound [`protocol::ServerEvent`]
//! - **Errors**: [`errors::SessionError`] taxonomy via `thiserror`
//! - **Logging**: [`logging::init_subscriber`] for the `tracing` subscriber
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other tandem crates.

#![deny(unsafe_code)]

pub mod clock;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod protocol;
pub mod timer;
