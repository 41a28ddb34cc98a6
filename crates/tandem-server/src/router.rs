//! Routes decoded client commands onto the session registry.

use metrics::counter;
use tandem_core::errors::SessionError;
use tandem_core::ids::ConnectionId;
use tandem_core::protocol::ClientCommand;
use tandem_core::timer::TimerCommand;

use crate::metrics::{TIMER_COMMAND_ERRORS_TOTAL, TIMER_COMMANDS_TOTAL};
use crate::registry::SessionRegistry;

/// Execute one command on behalf of `connection`.
///
/// Every reply and broadcast is emitted by the registry itself; the returned
/// error is for logging only.
pub fn dispatch(
    registry: &SessionRegistry,
    connection: &ConnectionId,
    command: ClientCommand,
) -> Result<(), SessionError> {
    let name = command.name();
    counter!(TIMER_COMMANDS_TOTAL, "command" => name).increment(1);

    let result = match command {
        ClientCommand::CreateSession => {
            let _ = registry.create_session(connection);
            Ok(())
        }
        ClientCommand::JoinSession { session_id } => {
            registry.join_session(&session_id, connection).map(drop)
        }
        ClientCommand::SyncRequest { session_id } => {
            registry.sync_request(&session_id, connection).map(drop)
        }
        ClientCommand::StartTimer {
            session_id,
            duration,
        } => registry
            .control(
                &session_id,
                connection,
                TimerCommand::Start {
                    duration_ms: duration,
                },
            )
            .map(drop),
        ClientCommand::PauseTimer { session_id } => registry
            .control(&session_id, connection, TimerCommand::Pause)
            .map(drop),
        ClientCommand::ResumeTimer { session_id } => registry
            .control(&session_id, connection, TimerCommand::Resume)
            .map(drop),
        ClientCommand::ResetTimer { session_id } => registry
            .control(&session_id, connection, TimerCommand::Reset)
            .map(drop),
    };

    if let Err(err) = &result {
        counter!(TIMER_COMMAND_ERRORS_TOTAL, "command" => name, "error_type" => err.error_kind())
            .increment(1);
    }
    result
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use tandem_core::clock::ManualClock;
    use tandem_core::protocol::ServerEvent;
    use tandem_core::timer::TimerSnapshot;

    use super::*;
    use crate::registry::testing::RecordingSink;

    fn setup() -> (SessionRegistry, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let registry = SessionRegistry::new(sink.clone(), Arc::new(ManualClock::new(0)));
        (registry, sink)
    }

    fn created_code(sink: &RecordingSink, host: &ConnectionId) -> String {
        match sink.events_for(host).first() {
            Some(ServerEvent::SessionCreated { session_id }) => session_id.to_string(),
            other => panic!("expected session-created, got {other:?}"),
        }
    }

    #[test]
    fn full_command_sequence() {
        let (registry, sink) = setup();
        let host = ConnectionId::from_raw("conn_host");
        let obs = ConnectionId::from_raw("conn_obs");

        dispatch(&registry, &host, ClientCommand::CreateSession).unwrap();
        let code = created_code(&sink, &host);
        let lower = code.to_ascii_lowercase();

        dispatch(&registry, &obs, ClientCommand::JoinSession { session_id: lower.clone() }).unwrap();
        dispatch(
            &registry,
            &host,
            ClientCommand::StartTimer {
                session_id: lower.clone(),
                duration: 5_000,
            },
        )
        .unwrap();
        dispatch(&registry, &host, ClientCommand::PauseTimer { session_id: lower.clone() }).unwrap();
        dispatch(&registry, &host, ClientCommand::ResumeTimer { session_id: lower.clone() }).unwrap();
        dispatch(&registry, &host, ClientCommand::ResetTimer { session_id: lower.clone() }).unwrap();
        dispatch(&registry, &obs, ClientCommand::SyncRequest { session_id: lower }).unwrap();

        let names: Vec<&str> = sink.events_for(&obs).iter().map(ServerEvent::name).collect();
        assert_eq!(
            names,
            [
                "timer-state",
                "timer-started",
                "timer-paused",
                "timer-resumed",
                "timer-reset",
                "timer-state"
            ]
        );
        assert_eq!(
            sink.events_for(&obs).last(),
            Some(&ServerEvent::TimerState(TimerSnapshot {
                duration: 0,
                is_running: false,
                remaining_time: 0
            }))
        );
    }

    #[test]
    fn observer_control_is_rejected_quietly() {
        let (registry, sink) = setup();
        let host = ConnectionId::from_raw("conn_host");
        let obs = ConnectionId::from_raw("conn_obs");
        dispatch(&registry, &host, ClientCommand::CreateSession).unwrap();
        let code = created_code(&sink, &host);
        sink.clear();

        let err = dispatch(
            &registry,
            &obs,
            ClientCommand::StartTimer {
                session_id: code,
                duration: 1_000,
            },
        )
        .unwrap_err();
        assert_matches!(err, SessionError::Unauthorized { .. });
        assert!(sink.all().is_empty());
    }

    #[test]
    fn join_unknown_surfaces_error_event() {
        let (registry, sink) = setup();
        let who = ConnectionId::from_raw("conn_who");
        let err = dispatch(
            &registry,
            &who,
            ClientCommand::JoinSession {
                session_id: "nothere".into(),
            },
        )
        .unwrap_err();
        assert_eq!(err.error_kind(), "not_found");
        assert_eq!(sink.events_for(&who), vec![ServerEvent::error("Session not found")]);
    }
}
