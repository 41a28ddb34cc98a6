//! Session and timer error taxonomy.
//!
//! Only a failed join or sync is ever reported to the client, as a
//! `session-error` carrying the `NotFound` message. Control commands from
//! non-hosts and transitions the timer cannot make are dropped without a
//! reply so observers learn nothing about who holds control.

use thiserror::Error;

use crate::ids::{ConnectionId, SessionCode};
use crate::timer::TimerPhase;

/// Failure of a session-level operation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SessionError {
    /// No active session has this code.
    #[error("Session not found")]
    NotFound(SessionCode),

    /// A non-host connection issued a control command.
    #[error("connection {connection} is not the host of session {session}")]
    Unauthorized {
        /// Target session.
        session: SessionCode,
        /// Offending connection.
        connection: ConnectionId,
    },

    /// The timer cannot make this transition from its current phase.
    #[error("cannot {command} a timer that is {phase}")]
    InvalidTransition {
        /// Command name (`start`, `pause`, ...).
        command: &'static str,
        /// Phase the timer was in.
        phase: TimerPhase,
    },
}

impl SessionError {
    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Unauthorized { .. } => "unauthorized",
            Self::InvalidTransition { .. } => "invalid_transition",
        }
    }
}
