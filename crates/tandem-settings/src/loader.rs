//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`TandemSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `TANDEM_*` environment variable overrides (highest priority)
//! 4. Clamp the tick interval and validate
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{MIN_TICK_INTERVAL_MS, TandemSettings};

/// Resolve the path to the settings file (`~/.tandem/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".tandem").join("settings.json")
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or an invalid final value is
/// an error.
pub fn load_settings_from_path(path: &Path) -> Result<TandemSettings> {
    load_with_env(path, |name| std::env::var(name).ok())
}

fn load_with_env<F>(path: &Path, lookup: F) -> Result<TandemSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = serde_json::to_value(TandemSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: TandemSettings = serde_json::from_value(merged)?;
    apply_env_overrides_with(&mut settings, lookup);
    clamp_tick_interval(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Compiled defaults with `TANDEM_*` overrides applied.
///
/// For callers that could not use the settings file but still want the
/// environment honored.
pub fn defaults_with_env() -> TandemSettings {
    defaults_with(|name| std::env::var(name).ok())
}

fn defaults_with<F>(lookup: F) -> TandemSettings
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = TandemSettings::default();
    apply_env_overrides_with(&mut settings, lookup);
    clamp_tick_interval(&mut settings);
    settings
}

/// Invalid values are logged and ignored (the file/default value stays).
fn apply_env_overrides_with<F>(settings: &mut TandemSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    if let Some(v) = env.string("TANDEM_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.u16("TANDEM_PORT", 0, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = env.usize("TANDEM_MAX_CONNECTIONS", 1, 100_000) {
        settings.server.max_connections = v;
    }
    if let Some(v) = env.u64("TANDEM_TICK_INTERVAL_MS", 1, 60_000) {
        settings.timer.tick_interval_ms = v;
    }
    if let Some(v) = env.string("TANDEM_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("TANDEM_LOG_JSON") {
        settings.logging.json = v;
    }
}

fn clamp_tick_interval(settings: &mut TandemSettings) {
    if settings.timer.tick_interval_ms < MIN_TICK_INTERVAL_MS {
        warn!(
            configured = settings.timer.tick_interval_ms,
            min = MIN_TICK_INTERVAL_MS,
            "tick interval below minimum, clamping"
        );
        settings.timer.tick_interval_ms = MIN_TICK_INTERVAL_MS;
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

// ── Env var readers ─────────────────────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn parsed<T>(&self, name: &str, kind: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        let val = (self.lookup)(name)?;
        let result = parse(&val);
        if result.is_none() {
            warn!(key = name, value = %val, kind, "invalid env var, ignoring");
        }
        result
    }

    fn bool(&self, name: &str) -> Option<bool> {
        self.parsed(name, "bool", parse_bool)
    }

    fn u16(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        self.parsed(name, "u16", |v| parse_u16_range(v, min, max))
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        self.parsed(name, "u64", |v| parse_u64_range(v, min, max))
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        self.parsed(name, "usize", |v| parse_usize_range(v, min, max))
    }
}
