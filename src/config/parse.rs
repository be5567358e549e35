//! Typed readers for environment variables.
//!
//! Unset and blank variables fall back to the default; set but malformed
//! ones are errors naming the variable.

use std::str::FromStr;
use std::time::Duration;

use super::ConfigError;

/// Trimmed value, `None` when unset or blank.
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Value or `default`.
pub fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

/// Boolean flag: `1 t true yes on` and `0 f false no off`, any case.
pub fn env_bool(key: &str, default: bool) -> Result<bool, ConfigError> {
    let Some(value) = env_opt(key) else {
        return Ok(default);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "yes" | "on" => Ok(true),
        "0" | "f" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Parse {
            key: key.into(),
            value,
            reason: "expected a boolean".into(),
        }),
    }
}

/// Any `FromStr` value or `default`.
pub fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env_opt(key) {
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Parse {
            key: key.into(),
            reason: e.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

/// Parse `250ms`, `3s`, `2m`, `1h` or bare seconds.
///
/// `off`, `0` and the empty string disable the setting and yield `None`.
pub fn parse_duration(s: &str) -> Result<Option<Duration>, String> {
    let s = s.trim();
    if s.is_empty() || s == "0" || s.eq_ignore_ascii_case("off") {
        return Ok(None);
    }

    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (number, unit) = s.split_at(split);
    let n: u64 = number
        .parse()
        .map_err(|_| format!("missing number in {:?}", s))?;

    let duration = match unit.to_ascii_lowercase().as_str() {
        "ms" => Duration::from_millis(n),
        "" | "s" => Duration::from_secs(n),
        "m" => Duration::from_secs(n * 60),
        "h" => Duration::from_secs(n * 3600),
        other => return Err(format!("unknown unit {:?}", other)),
    };
    Ok(Some(duration))
}

/// Duration variable, parsed like [`parse_duration`].
pub fn env_duration(key: &str, default: &str) -> Result<Option<Duration>, ConfigError> {
    let value = env_or(key, default);
    parse_duration(&value).map_err(|reason| ConfigError::Parse {
        key: key.into(),
        value,
        reason,
    })
}
