//! Countdown timer state machine.
//!
//! ```text
//!            start            pause
//!   Idle ─────────▶ Running ─────────▶ Paused
//!    ▲               │  ▲               │
//!    │               │  └───── resume ──┘
//!    │         tick  ▼  (remaining = 0)
//!    └── reset ── Finished ── start ──▶ Running
//! ```
//!
//! `reset` returns to `Idle` from every state. `start` is accepted from
//! `Idle`, `Paused` and `Finished` and always overwrites the previous
//! countdown. A `pause` arriving after the countdown has already run out
//! moves to `Finished` rather than `Paused`. While running, `remaining_ms` is
//! the frozen value at the moment the timer last entered `Running`; the live
//! value is derived from the wall clock by [`Timer::virtual_remaining_ms`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::SessionError;

/// Observable phase of a timer, derived from its fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerPhase {
    /// Never started, or reset.
    Idle,
    /// Counting down.
    Running,
    /// Stopped with time left.
    Paused,
    /// Counted down to zero.
    Finished,
}

impl fmt::Display for TimerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Finished => "finished",
        })
    }
}

/// Host control command applied to a timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerCommand {
    /// (Re)start a countdown of `duration_ms`.
    Start {
        /// Countdown length in milliseconds.
        duration_ms: u64,
    },
    /// Freeze the countdown.
    Pause,
    /// Continue a paused countdown.
    Resume,
    /// Return to idle.
    Reset,
}

impl TimerCommand {
    /// Short name used in logs and metric labels.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Reset => "reset",
        }
    }
}

/// Successful state change, used to pick the outbound event name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// `start` accepted.
    Started,
    /// `pause` accepted.
    Paused,
    /// `resume` accepted.
    Resumed,
    /// `reset` accepted.
    Reset,
    /// `pause` arrived after the countdown had already run out; the timer
    /// finished instead of pausing.
    Finished,
}

/// Result of advancing a running timer on a ticker pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Still running with this much time left.
    Update {
        /// Live remaining time in milliseconds (always > 0).
        remaining_ms: u64,
    },
    /// Reached zero on this tick; the timer is now `Finished`.
    Finished,
}

/// Immutable view of a timer as sent to clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    /// Configured countdown length in milliseconds.
    pub duration: u64,
    /// Whether the countdown is live.
    pub is_running: bool,
    /// Remaining time in milliseconds.
    pub remaining_time: u64,
}

/// Authoritative per-session countdown.
///
/// `started_at_ms` is `Some` exactly when the timer is running.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Timer {
    duration_ms: u64,
    remaining_ms: u64,
    started_at_ms: Option<u64>,
}

impl Timer {
    /// A zeroed, idle timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configured countdown length.
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Stored remaining time (a snapshot while running).
    pub fn remaining_ms(&self) -> u64 {
        self.remaining_ms
    }

    /// Wall-clock time the timer last entered `Running`.
    pub fn started_at_ms(&self) -> Option<u64> {
        self.started_at_ms
    }

    /// Whether the countdown is live.
    pub fn is_running(&self) -> bool {
        self.started_at_ms.is_some()
    }

    /// Current phase.
    pub fn phase(&self) -> TimerPhase {
        if self.is_running() {
            TimerPhase::Running
        } else if self.remaining_ms > 0 {
            TimerPhase::Paused
        } else if self.duration_ms > 0 {
            TimerPhase::Finished
        } else {
            TimerPhase::Idle
        }
    }

    /// Remaining time as of `now_ms`, without mutating the timer.
    pub fn virtual_remaining_ms(&self, now_ms: u64) -> u64 {
        match self.started_at_ms {
            Some(started) => self
                .remaining_ms
                .saturating_sub(now_ms.saturating_sub(started)),
            None => self.remaining_ms,
        }
    }

    /// Client-facing view as of `now_ms`.
    ///
    /// A running timer reports its live remaining time so a late joiner
    /// renders the right value before the next tick arrives.
    pub fn snapshot(&self, now_ms: u64) -> TimerSnapshot {
        TimerSnapshot {
            duration: self.duration_ms,
            is_running: self.is_running(),
            remaining_time: self.virtual_remaining_ms(now_ms),
        }
    }

    /// Apply a host command.
    pub fn apply(&mut self, command: TimerCommand, now_ms: u64) -> Result<Transition, SessionError> {
        match command {
            TimerCommand::Start { duration_ms } => self.start(duration_ms, now_ms),
            TimerCommand::Pause => self.pause(now_ms),
            TimerCommand::Resume => self.resume(now_ms),
            TimerCommand::Reset => {
                self.reset();
                Ok(Transition::Reset)
            }
        }
    }

    /// Begin a fresh countdown, discarding any previous one.
    pub fn start(&mut self, duration_ms: u64, now_ms: u64) -> Result<Transition, SessionError> {
        if self.is_running() {
            return Err(self.invalid("start"));
        }
        *self = Self {
            duration_ms,
            remaining_ms: duration_ms,
            started_at_ms: Some(now_ms),
        };
        Ok(Transition::Started)
    }

    /// Freeze the countdown at its live remaining value.
    pub fn pause(&mut self, now_ms: u64) -> Result<Transition, SessionError> {
        if !self.is_running() {
            return Err(self.invalid("pause"));
        }
        self.remaining_ms = self.virtual_remaining_ms(now_ms);
        self.started_at_ms = None;
        if self.remaining_ms == 0 {
            return Ok(Transition::Finished);
        }
        Ok(Transition::Paused)
    }

    /// Continue counting down from the frozen remaining value.
    pub fn resume(&mut self, now_ms: u64) -> Result<Transition, SessionError> {
        if self.is_running() || self.remaining_ms == 0 {
            return Err(self.invalid("resume"));
        }
        self.started_at_ms = Some(now_ms);
        Ok(Transition::Resumed)
    }

    /// Return to `Idle`.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Advance a running timer. Returns `None` when not running, so a
    /// finished timer never reports `Finished` twice.
    pub fn tick(&mut self, now_ms: u64) -> Option<TickOutcome> {
        if !self.is_running() {
            return None;
        }
        let remaining_ms = self.virtual_remaining_ms(now_ms);
        if remaining_ms == 0 {
            self.remaining_ms = 0;
            self.started_at_ms = None;
            Some(TickOutcome::Finished)
        } else {
            Some(TickOutcome::Update { remaining_ms })
        }
    }

    fn invalid(&self, command: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            command,
            phase: self.phase(),
        }
    }
}
