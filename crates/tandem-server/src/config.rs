//! Server configuration.

use std::time::Duration;

use tandem_settings::TandemSettings;

/// Runtime configuration for [`crate::server::TandemServer`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Heartbeat interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Disconnect a client that has not answered a ping for this long.
    pub heartbeat_timeout_secs: u64,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Per-connection outbound queue length.
    pub send_queue_capacity: usize,
    /// Ticker period in milliseconds.
    pub tick_interval_ms: u64,
}

impl ServerConfig {
    /// Ticker period.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Ping period.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Silence allowed before a client is dropped.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 1_000,
            heartbeat_interval_secs: 25,
            heartbeat_timeout_secs: 60,
            max_message_size: 64 * 1024,
            send_queue_capacity: 256,
            tick_interval_ms: 100,
        }
    }
}

impl From<&TandemSettings> for ServerConfig {
    fn from(settings: &TandemSettings) -> Self {
        let server = &settings.server;
        Self {
            host: server.host.clone(),
            port: server.port,
            max_connections: server.max_connections,
            heartbeat_interval_secs: server.heartbeat_interval_secs,
            heartbeat_timeout_secs: server.heartbeat_timeout_secs,
            max_message_size: server.max_message_size,
            send_queue_capacity: server.send_queue_capacity,
            tick_interval_ms: settings.timer.tick_interval_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_loopback_on_ephemeral_port() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 0);
        assert_eq!(cfg.tick_interval(), Duration::from_millis(100));
    }

    #[test]
    fn from_settings_copies_every_field() {
        let mut settings = TandemSettings::default();
        settings.server.port = 4321;
        settings.server.max_connections = 7;
        settings.server.send_queue_capacity = 16;
        settings.timer.tick_interval_ms = 250;

        let cfg = ServerConfig::from(&settings);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 4321);
        assert_eq!(cfg.max_connections, 7);
        assert_eq!(cfg.send_queue_capacity, 16);
        assert_eq!(cfg.tick_interval_ms, 250);
        assert_eq!(cfg.heartbeat_interval(), Duration::from_secs(25));
        assert_eq!(cfg.heartbeat_timeout(), Duration::from_secs(60));
    }
}
