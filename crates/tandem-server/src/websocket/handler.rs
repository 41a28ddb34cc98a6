//! Inbound frame handling: decode, then route.

use tandem_core::ids::ConnectionId;
use tandem_core::protocol::{ClientCommand, ServerEvent};
use tracing::{debug, instrument, warn};

use crate::registry::SessionRegistry;
use crate::router;

/// Handle one inbound text frame from `connection`.
///
/// Returns a direct reply for frames that could not be decoded. Everything
/// else the client should see is emitted by the registry.
#[instrument(skip_all, fields(command))]
pub fn handle_message(
    message: &str,
    connection: &ConnectionId,
    registry: &SessionRegistry,
) -> Option<ServerEvent> {
    let command = match ClientCommand::decode(message) {
        Ok(c) => c,
        Err(e) => {
            warn!(conn_id = %connection, error = %e, "invalid message received");
            return Some(ServerEvent::error(format!("Invalid message: {e}")));
        }
    };

    let name = command.name();
    let _ = tracing::Span::current().record("command", name);
    debug!(conn_id = %connection, "dispatching command");

    if let Err(err) = router::dispatch(registry, connection, command) {
        debug!(conn_id = %connection, kind = err.error_kind(), error = %err, "command rejected");
    }
    None
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use tandem_core::clock::ManualClock;

    use super::*;
    use crate::registry::testing::RecordingSink;

    fn setup() -> (SessionRegistry, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        (
            SessionRegistry::new(sink.clone(), Arc::new(ManualClock::new(0))),
            sink,
        )
    }

    #[test]
    fn valid_frame_routes_without_direct_reply() {
        let (registry, sink) = setup();
        let host = ConnectionId::from_raw("conn_host");
        assert!(handle_message(r#"{"event":"create-session"}"#, &host, &registry).is_none());
        assert_eq!(registry.session_count(), 1);
        assert_matches!(
            sink.events_for(&host).as_slice(),
            [ServerEvent::SessionCreated { .. }]
        );
    }

    #[test]
    fn create_session_with_empty_data_object() {
        let (registry, sink) = setup();
        let host = ConnectionId::from_raw("conn_host");
        let reply = handle_message(r#"{"event":"create-session","data":{}}"#, &host, &registry);
        assert!(reply.is_none());
        assert_eq!(registry.session_count(), 1);
        assert_matches!(
            sink.events_for(&host).as_slice(),
            [ServerEvent::SessionCreated { .. }]
        );
    }

    #[test]
    fn garbage_gets_invalid_message_reply() {
        let (registry, sink) = setup();
        let who = ConnectionId::from_raw("conn_who");
        let reply = handle_message("not json", &who, &registry);
        assert_matches!(reply, Some(ServerEvent::SessionError { message }) if message.starts_with("Invalid message:"));
        assert!(sink.all().is_empty());
    }

    #[test]
    fn unknown_event_gets_invalid_message_reply() {
        let (registry, _sink) = setup();
        let who = ConnectionId::from_raw("conn_who");
        let reply = handle_message(r#"{"event":"self-destruct"}"#, &who, &registry);
        assert_matches!(reply, Some(ServerEvent::SessionError { .. }));
    }

    #[test]
    fn negative_duration_is_invalid() {
        let (registry, _sink) = setup();
        let who = ConnectionId::from_raw("conn_who");
        let reply = handle_message(
            r#"{"event":"start-timer","data":{"sessionId":"ABC1234","duration":-1}}"#,
            &who,
            &registry,
        );
        assert_matches!(reply, Some(ServerEvent::SessionError { .. }));
    }

    #[test]
    fn rejected_command_is_silent() {
        let (registry, sink) = setup();
        let who = ConnectionId::from_raw("conn_who");
        let reply = handle_message(
            r#"{"event":"pause-timer","data":{"sessionId":"ABC1234"}}"#,
            &who,
            &registry,
        );
        assert!(reply.is_none());
        assert!(sink.all().is_empty());
    }
}
