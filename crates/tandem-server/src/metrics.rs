//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render `/metrics`. Call once at startup, before
/// anything is recorded; a second call fails.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

// Metric name constants to avoid typos across modules.

/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// WebSocket connection duration seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Outbound frames dropped on a full queue (counter).
pub const WS_BROADCAST_DROPS_TOTAL: &str = "ws_broadcast_drops_total";
/// Clients force-closed for falling behind (counter).
pub const WS_SLOW_CLIENT_EVICTIONS_TOTAL: &str = "ws_slow_client_evictions_total";
/// Sessions created total (counter).
pub const SESSIONS_CREATED_TOTAL: &str = "sessions_created_total";
/// Registered sessions (gauge).
pub const SESSIONS_ACTIVE: &str = "sessions_active";
/// Inbound commands (counter, labels: command).
pub const TIMER_COMMANDS_TOTAL: &str = "timer_commands_total";
/// Rejected commands (counter, labels: command, error_type).
pub const TIMER_COMMAND_ERRORS_TOTAL: &str = "timer_command_errors_total";
/// Countdowns that reached zero (counter).
pub const TIMERS_FINISHED_TOTAL: &str = "timers_finished_total";
/// Time spent in one ticker pass (histogram).
pub const TICKER_TICK_DURATION_SECONDS: &str = "ticker_tick_duration_seconds";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_recorder_renders() {
        // Local recorder only; the global one can be installed once per process.
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            metrics::counter!(SESSIONS_CREATED_TOTAL).increment(3);
        });
        assert!(handle.render().contains("sessions_created_total 3"));
    }

    #[test]
    fn metric_names_are_snake_case() {
        let names = [
            WS_CONNECTIONS_TOTAL,
            WS_CONNECTIONS_ACTIVE,
            WS_CONNECTION_DURATION_SECONDS,
            WS_BROADCAST_DROPS_TOTAL,
            WS_SLOW_CLIENT_EVICTIONS_TOTAL,
            SESSIONS_CREATED_TOTAL,
            SESSIONS_ACTIVE,
            TIMER_COMMANDS_TOTAL,
            TIMER_COMMAND_ERRORS_TOTAL,
            TIMERS_FINISHED_TOTAL,
            TICKER_TICK_DURATION_SECONDS,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
