//! One shared countdown and the connections watching it.

use chrono::{DateTime, Utc};
use tandem_core::ids::{ConnectionId, SessionCode};
use tandem_core::timer::Timer;

/// A live session: its host, its observers, and the timer they share.
///
/// The host never migrates. When the host's connection goes away the
/// registry deletes the whole session.
#[derive(Clone, Debug)]
pub struct Session {
    code: SessionCode,
    host: ConnectionId,
    /// Non-host subscribers in join order, without duplicates.
    participants: Vec<ConnectionId>,
    timer: Timer,
    created_at: DateTime<Utc>,
}

impl Session {
    /// New session with an idle timer and no participants.
    pub fn new(code: SessionCode, host: ConnectionId) -> Self {
        Self {
            code,
            host,
            participants: Vec::new(),
            timer: Timer::new(),
            created_at: Utc::now(),
        }
    }

    /// Session code.
    pub fn code(&self) -> &SessionCode {
        &self.code
    }

    /// Connection holding control.
    pub fn host(&self) -> &ConnectionId {
        &self.host
    }

    /// Whether `connection` is the host.
    pub fn is_host(&self, connection: &ConnectionId) -> bool {
        &self.host == connection
    }

    /// Non-host subscribers.
    pub fn participants(&self) -> &[ConnectionId] {
        &self.participants
    }

    /// Subscribe a connection. Returns `false` for the host or a repeat join.
    pub fn add_participant(&mut self, connection: &ConnectionId) -> bool {
        if self.is_host(connection) || self.participants.contains(connection) {
            return false;
        }
        self.participants.push(connection.clone());
        true
    }

    /// Unsubscribe a connection. Returns whether it was subscribed.
    pub fn remove_participant(&mut self, connection: &ConnectionId) -> bool {
        let before = self.participants.len();
        self.participants.retain(|p| p != connection);
        self.participants.len() != before
    }

    /// Every connection that receives this session's broadcasts, host first.
    pub fn members(&self) -> Vec<ConnectionId> {
        std::iter::once(&self.host)
            .chain(&self.participants)
            .cloned()
            .collect()
    }

    /// The shared timer.
    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    /// Mutable access to the shared timer.
    pub fn timer_mut(&mut self) -> &mut Timer {
        &mut self.timer
    }

    /// When the session was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
