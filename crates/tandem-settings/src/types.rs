//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and `#[serde(default)]`
//! so a settings file only needs the keys it changes.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Smallest accepted ticker interval.
pub const MIN_TICK_INTERVAL_MS: u64 = 10;

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 4000 },
///   "timer": { "tickIntervalMs": 100 },
///   "logging": { "level": "debug" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TandemSettings {
    /// Network and connection settings.
    pub server: ServerSettings,
    /// Synchronization ticker settings.
    pub timer: TimerSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

impl TandemSettings {
    /// Reject combinations the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.timer.tick_interval_ms < MIN_TICK_INTERVAL_MS {
            return Err(SettingsError::InvalidValue(format!(
                "timer.tickIntervalMs must be >= {MIN_TICK_INTERVAL_MS}, got {}",
                self.timer.tick_interval_ms
            )));
        }
        if self.server.heartbeat_interval_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "server.heartbeatIntervalSecs must be > 0".into(),
            ));
        }
        if self.server.heartbeat_timeout_secs < self.server.heartbeat_interval_secs {
            return Err(SettingsError::InvalidValue(
                "server.heartbeatTimeoutSecs must be >= server.heartbeatIntervalSecs".into(),
            ));
        }
        if self.server.send_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "server.sendQueueCapacity must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Server network settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port (`0` to auto-assign).
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Interval between server Ping frames.
    pub heartbeat_interval_secs: u64,
    /// Disconnect a client silent for this long.
    pub heartbeat_timeout_secs: u64,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Per-connection outbound queue length.
    pub send_queue_capacity: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            max_connections: 1_000,
            heartbeat_interval_secs: 25,
            heartbeat_timeout_secs: 60,
            max_message_size: 64 * 1024,
            send_queue_capacity: 256,
        }
    }
}

/// Synchronization ticker settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimerSettings {
    /// How often running timers are re-broadcast, in milliseconds.
    pub tick_interval_ms: u64,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive (overridden by `RUST_LOG`).
    pub level: String,
    /// Emit one JSON object per line instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn defaults() {
        let s = TandemSettings::default();
        assert_eq!(s.server.host, "0.0.0.0");
        assert_eq!(s.server.port, 3001);
        assert_eq!(s.timer.tick_interval_ms, 100);
        assert_eq!(s.logging.level, "info");
        assert!(!s.logging.json);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(TandemSettings::default()).unwrap();
        assert_eq!(json["timer"]["tickIntervalMs"], 100);
        assert_eq!(json["server"]["maxConnections"], 1000);
        assert_eq!(json["server"]["heartbeatTimeoutSecs"], 60);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: TandemSettings = serde_json::from_str(r#"{"server":{"port":4000}}"#).unwrap();
        assert_eq!(s.server.port, 4000);
        assert_eq!(s.server.host, "0.0.0.0");
        assert_eq!(s.timer.tick_interval_ms, 100);
    }

    #[test]
    fn tick_interval_too_small() {
        let mut s = TandemSettings::default();
        s.timer.tick_interval_ms = 1;
        assert_matches!(s.validate(), Err(SettingsError::InvalidValue(msg)) if msg.contains("tickIntervalMs"));
    }

    #[test]
    fn heartbeat_timeout_shorter_than_interval() {
        let mut s = TandemSettings::default();
        s.server.heartbeat_interval_secs = 30;
        s.server.heartbeat_timeout_secs = 10;
        assert_matches!(s.validate(), Err(SettingsError::InvalidValue(_)));
    }

    #[test]
    fn zero_send_queue() {
        let mut s = TandemSettings::default();
        s.server.send_queue_capacity = 0;
        assert!(s.validate().is_err());
    }
}
