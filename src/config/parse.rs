//! Environment variable parsing utilities.

use std::str::FromStr;
use std::time::Duration;

use super::ConfigError;

/// Get environment variable with default value.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get optional environment variable (None if empty or missing).
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

/// Parse environment variable as boolean.
/// Treats "1", "true" (case-insensitive) as true.
pub fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(default)
}

/// Parse environment variable with type conversion.
pub fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => v.parse().map_err(|e: T::Err| ConfigError::Parse {
            key: key.into(),
            value: v,
            error: e.to_string(),
        }),
        _ => Ok(default),
    }
}

/// Longest accepted duration (one week).
pub const MAX_DURATION: Duration = Duration::from_secs(7 * 24 * 3600);

/// Parse duration string (e.g., "250ms", "30s", "2m", "1h").
/// Bare numbers are seconds. "0" is a zero duration.
/// Anything above [`MAX_DURATION`] is rejected.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim().to_lowercase();

    if s.is_empty() {
        return Err("empty duration".to_string());
    }

    let (num_str, unit_secs) = if let Some(num) = s.strip_suffix("ms") {
        (num, None)
    } else if let Some(num) = s.strip_suffix('s') {
        (num, Some(1))
    } else if let Some(num) = s.strip_suffix('m') {
        (num, Some(60))
    } else if let Some(num) = s.strip_suffix('h') {
        (num, Some(3600))
    } else {
        // Bare seconds
        (s.as_str(), Some(1))
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration: {}", s))?;

    let duration = match unit_secs {
        None => Some(Duration::from_millis(num)),
        Some(unit) => num.checked_mul(unit).map(Duration::from_secs),
    };

    match duration {
        Some(d) if d <= MAX_DURATION => Ok(d),
        _ => Err(format!("duration too large: {} (max 7d)", s)),
    }
}

/// Parse environment variable as duration.
pub fn env_duration(key: &str, default: &str) -> Result<Duration, ConfigError> {
    let value = env_or(key, default);
    parse_duration(&value).map_err(|e| ConfigError::Parse {
        key: key.into(),
        value,
        error: e,
    })
}
