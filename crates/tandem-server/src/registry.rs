//! In-memory session registry.
//!
//! Every session mutation, from commands and from the ticker alike, runs under
//! one mutex. Outbound events are handed to the [`EventSink`] while that lock
//! is still held, so two events for the same session always reach each
//! connection's queue in the order they were produced.
//!
//! Lock order: registry, then sink. A sink must never call back into the
//! registry.

use std::collections::HashMap;
use std::slice;
use std::sync::Arc;

use chrono::Utc;
use metrics::{counter, gauge};
use parking_lot::Mutex;
use tracing::{debug, info};

use tandem_core::clock::Clock;
use tandem_core::errors::SessionError;
use tandem_core::ids::{ConnectionId, SessionCode};
use tandem_core::protocol::ServerEvent;
use tandem_core::timer::{TickOutcome, TimerCommand, TimerSnapshot, Transition};

use crate::metrics::{SESSIONS_ACTIVE, SESSIONS_CREATED_TOTAL, TIMERS_FINISHED_TOTAL};
use crate::session::Session;

/// Delivery seam between the registry and the transport.
pub trait EventSink: Send + Sync {
    /// Enqueue `event` for each recipient without blocking.
    ///
    /// Unknown or closed recipients are skipped.
    fn deliver(&self, recipients: &[ConnectionId], event: &ServerEvent);
}

/// What one ticker pass did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Sessions that received a `timer-update`.
    pub updated: usize,
    /// Sessions whose countdown reached zero on this pass.
    pub finished: Vec<SessionCode>,
}

/// All live sessions, keyed by uppercase code.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionCode, Session>>,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
}

impl SessionRegistry {
    /// Empty registry delivering through `sink` and reading time from `clock`.
    pub fn new(sink: Arc<dyn EventSink>, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            sink,
            clock,
        }
    }

    /// Open a session hosted by `host` and send it `session-created`.
    pub fn create_session(&self, host: &ConnectionId) -> SessionCode {
        let mut sessions = self.sessions.lock();
        let code = loop {
            let candidate = SessionCode::generate();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
            debug!(session_id = %candidate, "session code collision, regenerating");
        };
        let _ = sessions.insert(code.clone(), Session::new(code.clone(), host.clone()));

        counter!(SESSIONS_CREATED_TOTAL).increment(1);
        gauge!(SESSIONS_ACTIVE).set(sessions.len() as f64);
        info!(session_id = %code, host = %host, "session created");

        self.sink.deliver(
            slice::from_ref(host),
            &ServerEvent::SessionCreated {
                session_id: code.clone(),
            },
        );
        code
    }

    /// Subscribe `connection` and send it the current `timer-state`.
    ///
    /// An unknown code answers `session-error` to the requester and changes
    /// nothing.
    pub fn join_session(
        &self,
        session_id: &str,
        connection: &ConnectionId,
    ) -> Result<TimerSnapshot, SessionError> {
        let code = SessionCode::parse(session_id);
        let mut sessions = self.sessions.lock();
        let Some(session) = sessions.get_mut(&code) else {
            return Err(self.reject_not_found(code, connection));
        };

        if session.add_participant(connection) {
            info!(session_id = %code, conn_id = %connection, "participant joined");
        }
        let snapshot = session.timer().snapshot(self.clock.now_ms());
        self.sink
            .deliver(slice::from_ref(connection), &ServerEvent::TimerState(snapshot));
        Ok(snapshot)
    }

    /// Send the requester the current `timer-state` without subscribing it.
    pub fn sync_request(
        &self,
        session_id: &str,
        connection: &ConnectionId,
    ) -> Result<TimerSnapshot, SessionError> {
        let code = SessionCode::parse(session_id);
        let sessions = self.sessions.lock();
        let Some(session) = sessions.get(&code) else {
            return Err(self.reject_not_found(code, connection));
        };

        let snapshot = session.timer().snapshot(self.clock.now_ms());
        self.sink
            .deliver(slice::from_ref(connection), &ServerEvent::TimerState(snapshot));
        Ok(snapshot)
    }

    /// Apply a host command and broadcast the resulting snapshot to every
    /// member.
    ///
    /// Unknown sessions, non-host senders, and impossible transitions return
    /// an error and emit nothing. A pause that lands at zero is sent as
    /// `timer-finished`.
    pub fn control(
        &self,
        session_id: &str,
        connection: &ConnectionId,
        command: TimerCommand,
    ) -> Result<TimerSnapshot, SessionError> {
        let code = SessionCode::parse(session_id);
        let mut sessions = self.sessions.lock();
        let session = sessions
            .get_mut(&code)
            .ok_or_else(|| SessionError::NotFound(code.clone()))?;
        if !session.is_host(connection) {
            return Err(SessionError::Unauthorized {
                session: code,
                connection: connection.clone(),
            });
        }

        let now = self.clock.now_ms();
        let transition = session.timer_mut().apply(command, now)?;
        if transition == Transition::Finished {
            counter!(TIMERS_FINISHED_TOTAL).increment(1);
        }
        let snapshot = session.timer().snapshot(now);
        info!(
            session_id = %code,
            command = command.name(),
            duration_ms = snapshot.duration,
            remaining_ms = snapshot.remaining_time,
            "timer command applied"
        );

        self.sink.deliver(
            &session.members(),
            &ServerEvent::for_transition(transition, snapshot),
        );
        Ok(snapshot)
    }

    /// Forget a closed connection.
    ///
    /// Every session it hosts is deleted after its members are sent
    /// `session-ended`; it is dropped from every other session's
    /// participants. Returns the codes of the deleted sessions.
    pub fn remove_connection(&self, connection: &ConnectionId) -> Vec<SessionCode> {
        let mut sessions = self.sessions.lock();
        let hosted: Vec<SessionCode> = sessions
            .values()
            .filter(|s| s.is_host(connection))
            .map(|s| s.code().clone())
            .collect();

        for code in &hosted {
            if let Some(session) = sessions.remove(code) {
                let lifetime_secs = (Utc::now() - session.created_at()).num_seconds();
                info!(session_id = %code, lifetime_secs, "host left, session ended");
                self.sink.deliver(&session.members(), &ServerEvent::SessionEnded);
            }
        }
        for session in sessions.values_mut() {
            if session.remove_participant(connection) {
                debug!(session_id = %session.code(), conn_id = %connection, "participant left");
            }
        }

        gauge!(SESSIONS_ACTIVE).set(sessions.len() as f64);
        hosted
    }

    /// One synchronization pass over every running timer.
    ///
    /// Emits `timer-update` with the live remaining time, or `timer-finished`
    /// once when a countdown reaches zero.
    pub fn tick(&self) -> TickReport {
        let now = self.clock.now_ms();
        let mut report = TickReport::default();
        let mut sessions = self.sessions.lock();

        for session in sessions.values_mut() {
            match session.timer_mut().tick(now) {
                None => {}
                Some(TickOutcome::Update { remaining_ms }) => {
                    report.updated += 1;
                    self.sink.deliver(
                        &session.members(),
                        &ServerEvent::TimerUpdate {
                            remaining: remaining_ms,
                        },
                    );
                }
                Some(TickOutcome::Finished) => {
                    info!(session_id = %session.code(), "timer finished");
                    report.finished.push(session.code().clone());
                    self.sink
                        .deliver(&session.members(), &ServerEvent::TimerFinished);
                }
            }
        }
        report
    }

    /// Current snapshot of a session, if it exists.
    pub fn snapshot(&self, session_id: &str) -> Option<TimerSnapshot> {
        let now = self.clock.now_ms();
        self.sessions
            .lock()
            .get(&SessionCode::parse(session_id))
            .map(|s| s.timer().snapshot(now))
    }

    /// Number of registered sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Number of sessions whose timer is running.
    pub fn running_count(&self) -> usize {
        self.sessions
            .lock()
            .values()
            .filter(|s| s.timer().is_running())
            .count()
    }

    fn reject_not_found(&self, code: SessionCode, connection: &ConnectionId) -> SessionError {
        debug!(session_id = %code, conn_id = %connection, "unknown session");
        let err = SessionError::NotFound(code);
        self.sink
            .deliver(slice::from_ref(connection), &ServerEvent::error(err.to_string()));
        err
    }
}
