//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`RelaySettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `HUBRELAY_*` environment overrides (highest priority)
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use hubrelay_core::SharedSecret;
use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::{LogFormat, RelaySettings};

/// Environment variable holding the shared secret.
pub const SECRET_ENV: &str = "HUBRELAY_SECRET";

/// Routes the server always mounts besides the subscriber endpoint.
const RESERVED_PATHS: [&str; 2] = ["/health", "/metrics"];

/// Resolve the default settings file path (`~/.hubrelay/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".hubrelay").join("settings.json")
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON or an invalid final value is
/// an error.
pub fn load_settings_from_path(path: &Path) -> Result<RelaySettings> {
    load_settings_with(path, |name| std::env::var(name).ok())
}

/// Load settings from `path`, resolving overrides through `lookup`.
pub fn load_settings_with(
    path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<RelaySettings> {
    let defaults = serde_json::to_value(RelaySettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: RelaySettings = serde_json::from_value(merged)?;
    apply_overrides(&mut settings, lookup);
    validate(&settings)?;
    Ok(settings)
}

/// Read the shared secret from [`SECRET_ENV`].
pub fn load_secret() -> Result<SharedSecret> {
    load_secret_from(|name| std::env::var(name).ok())
}

/// Read the shared secret through `lookup`. Unset and empty are both fatal.
pub fn load_secret_from(lookup: impl Fn(&str) -> Option<String>) -> Result<SharedSecret> {
    let value = lookup(SECRET_ENV).unwrap_or_default();
    SharedSecret::new(&value).map_err(|_| SettingsError::MissingSecret(SECRET_ENV))
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `HUBRELAY_*` overrides. Invalid values are logged and ignored.
pub fn apply_overrides(settings: &mut RelaySettings, lookup: impl Fn(&str) -> Option<String>) {
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = read("HUBRELAY_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = parsed(&read, "HUBRELAY_PORT", |s| parse_u16_range(s, 0, 65535)) {
        settings.server.port = v;
    }
    if let Some(v) = read("HUBRELAY_WS_PATH") {
        settings.server.ws_path = v;
    }
    if let Some(v) = parsed(&read, "HUBRELAY_MAX_SUBSCRIBERS", |s| {
        parse_usize_range(s, 1, 1_000_000)
    }) {
        settings.server.max_subscribers = v;
    }
    if let Some(v) = parsed(&read, "HUBRELAY_QUEUE_CAPACITY", |s| {
        parse_usize_range(s, 1, 65_536)
    }) {
        settings.server.subscriber_queue_capacity = v;
    }
    if let Some(v) = parsed(&read, "HUBRELAY_PING_INTERVAL_SECS", |s| {
        parse_u64_range(s, 1, 3600)
    }) {
        settings.server.ping_interval_secs = v;
    }
    if let Some(v) = parsed(&read, "HUBRELAY_IDLE_TIMEOUT_SECS", |s| {
        parse_u64_range(s, 1, 86_400)
    }) {
        settings.server.idle_timeout_secs = v;
    }
    if let Some(v) = parsed(&read, "HUBRELAY_MAX_BODY_BYTES", |s| {
        parse_usize_range(s, 1024, 64 * 1024 * 1024)
    }) {
        settings.server.max_body_bytes = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read("HUBRELAY_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = parsed(&read, "HUBRELAY_LOG_FORMAT", parse_log_format) {
        settings.logging.format = v;
    }
}

/// Reject settings the server cannot run with.
pub fn validate(settings: &RelaySettings) -> Result<()> {
    let server = &settings.server;
    if !server.ws_path.starts_with('/') {
        return Err(SettingsError::InvalidValue(format!(
            "wsPath must start with '/': {}",
            server.ws_path
        )));
    }
    if server.ws_path.starts_with("/v1/stream") {
        return Err(SettingsError::InvalidValue(
            "wsPath must not overlap the webhook routes".into(),
        ));
    }
    if RESERVED_PATHS.contains(&server.ws_path.as_str()) {
        return Err(SettingsError::InvalidValue(format!(
            "wsPath {} is already routed",
            server.ws_path
        )));
    }
    // captures and wildcards are route syntax, not literal path characters
    if server.ws_path.contains(['{', '}', '*']) {
        return Err(SettingsError::InvalidValue(format!(
            "wsPath must be a literal path: {}",
            server.ws_path
        )));
    }
    if server.subscriber_queue_capacity == 0 {
        return Err(SettingsError::InvalidValue(
            "subscriberQueueCapacity must be at least 1".into(),
        ));
    }
    if server.max_subscribers == 0 {
        return Err(SettingsError::InvalidValue(
            "maxSubscribers must be at least 1".into(),
        ));
    }
    if server.ping_interval_secs == 0 || server.idle_timeout_secs == 0 {
        return Err(SettingsError::InvalidValue(
            "pingIntervalSecs and idleTimeoutSecs must be positive".into(),
        ));
    }
    Ok(())
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a log format name (case-insensitive).
pub fn parse_log_format(val: &str) -> Option<LogFormat> {
    match val.to_lowercase().as_str() {
        "compact" | "text" => Some(LogFormat::Compact),
        "json" => Some(LogFormat::Json),
        _ => None,
    }
}

fn parsed<T>(
    read: &impl Fn(&str) -> Option<String>,
    name: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    let val = read(name)?;
    let result = parse(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid env var, ignoring");
    }
    result
}
