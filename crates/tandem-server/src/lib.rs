//! # tandem-server
//!
//! Authoritative countdown state and the WebSocket gateway in front of it.
//!
//! - [`registry::SessionRegistry`]: every live session and its timer, behind one lock
//! - [`ticker`]: periodic re-synchronization of running timers
//! - [`router::dispatch`]: maps a decoded [`tandem_core::protocol::ClientCommand`] onto the registry
//! - [`websocket`]: per-connection lifecycle, heartbeat, fan-out with slow-client eviction
//! - [`server::TandemServer`]: Axum router (`/ws`, `/health`, `/metrics`) and listener
//! - Graceful shutdown via [`shutdown::ShutdownCoordinator`] (`CancellationToken`)

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod metrics;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;
pub mod shutdown;
pub mod ticker;
pub mod websocket;
