//! Wire protocol: JSON text frames of the form `{"event": "<name>", "data": {...}}`.
//!
//! `data` is omitted for events without a payload (`create-session`,
//! `timer-finished`, `session-ended`).

use serde::{Deserialize, Serialize};

use crate::ids::{ConnectionId, SessionCode};
use crate::timer::{TimerSnapshot, Transition};

/// Inbound command from a participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientCommand {
    /// Open a new session hosted by the sender.
    CreateSession,
    /// Subscribe to an existing session.
    #[serde(rename_all = "camelCase")]
    JoinSession {
        /// Session code (any case).
        session_id: String,
    },
    /// Host: start a countdown.
    #[serde(rename_all = "camelCase")]
    StartTimer {
        /// Session code (any case).
        session_id: String,
        /// Countdown length in milliseconds.
        duration: u64,
    },
    /// Host: pause.
    #[serde(rename_all = "camelCase")]
    PauseTimer {
        /// Session code (any case).
        session_id: String,
    },
    /// Host: resume.
    #[serde(rename_all = "camelCase")]
    ResumeTimer {
        /// Session code (any case).
        session_id: String,
    },
    /// Host: reset to idle.
    #[serde(rename_all = "camelCase")]
    ResetTimer {
        /// Session code (any case).
        session_id: String,
    },
    /// Pull the current snapshot (after reconnecting).
    #[serde(rename_all = "camelCase")]
    SyncRequest {
        /// Session code (any case).
        session_id: String,
    },
}

impl ClientCommand {
    /// Decode one inbound text frame.
    ///
    /// An empty `"data": {}` is treated like a missing payload, so
    /// `create-session` accepts it too.
    pub fn decode(frame: &str) -> serde_json::Result<Self> {
        let mut value: serde_json::Value = serde_json::from_str(frame)?;
        if let Some(fields) = value.as_object_mut() {
            let empty_data = fields
                .get("data")
                .and_then(serde_json::Value::as_object)
                .is_some_and(serde_json::Map::is_empty);
            if empty_data {
                let _ = fields.remove("data");
            }
        }
        serde_json::from_value(value)
    }

    /// Wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateSession => "create-session",
            Self::JoinSession { .. } => "join-session",
            Self::StartTimer { .. } => "start-timer",
            Self::PauseTimer { .. } => "pause-timer",
            Self::ResumeTimer { .. } => "resume-timer",
            Self::ResetTimer { .. } => "reset-timer",
            Self::SyncRequest { .. } => "sync-request",
        }
    }
}

/// Outbound event pushed to participants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// First frame on every connection.
    #[serde(rename_all = "camelCase")]
    ConnectionEstablished {
        /// Identity assigned to this connection.
        connection_id: ConnectionId,
    },
    /// Sent to the creator only.
    #[serde(rename_all = "camelCase")]
    SessionCreated {
        /// Code to share with participants.
        session_id: SessionCode,
    },
    /// Current state, in reply to join or sync.
    TimerState(TimerSnapshot),
    /// Host started a countdown.
    TimerStarted(TimerSnapshot),
    /// Host paused.
    TimerPaused(TimerSnapshot),
    /// Host resumed.
    TimerResumed(TimerSnapshot),
    /// Host reset.
    TimerReset(TimerSnapshot),
    /// Periodic live remaining time.
    TimerUpdate {
        /// Remaining time in milliseconds.
        remaining: u64,
    },
    /// Countdown reached zero.
    TimerFinished,
    /// Request failed (unknown session, malformed frame).
    SessionError {
        /// Human-readable reason.
        message: String,
    },
    /// Host disconnected; the session no longer exists.
    SessionEnded,
}

impl ServerEvent {
    /// Event for a successful timer transition.
    pub fn for_transition(transition: Transition, snapshot: TimerSnapshot) -> Self {
        match transition {
            Transition::Started => Self::TimerStarted(snapshot),
            Transition::Paused => Self::TimerPaused(snapshot),
            Transition::Resumed => Self::TimerResumed(snapshot),
            Transition::Reset => Self::TimerReset(snapshot),
            Transition::Finished => Self::TimerFinished,
        }
    }

    /// Shorthand for a `session-error`.
    pub fn error(message: impl Into<String>) -> Self {
        Self::SessionError {
            message: message.into(),
        }
    }

    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConnectionEstablished { .. } => "connection-established",
            Self::SessionCreated { .. } => "session-created",
            Self::TimerState(_) => "timer-state",
            Self::TimerStarted(_) => "timer-started",
            Self::TimerPaused(_) => "timer-paused",
            Self::TimerResumed(_) => "timer-resumed",
            Self::TimerReset(_) => "timer-reset",
            Self::TimerUpdate { .. } => "timer-update",
            Self::TimerFinished => "timer-finished",
            Self::SessionError { .. } => "session-error",
            Self::SessionEnded => "session-ended",
        }
    }
}
