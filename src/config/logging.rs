//! Log filter and service identity.

use super::parse::{env_opt, env_or};
use super::ConfigError;

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// `EnvFilter` directive string.
    pub filter: String,
    /// Written into every line's `ctx.service`.
    pub service_name: String,
}

impl LoggingConfig {
    /// `RUST_LOG` (full directive syntax) wins over `LOG_LEVEL` (a bare level).
    pub fn from_env() -> Result<Self, ConfigError> {
        let filter = match (env_opt("RUST_LOG"), env_opt("LOG_LEVEL")) {
            (Some(directives), _) => directives,
            (None, Some(level)) => level_filter(&level)?,
            (None, None) => level_filter("info")?,
        };

        Ok(Self {
            filter,
            service_name: env_or("SERVICE_NAME", "gantry"),
        })
    }
}

/// Apply one level to the crate and to access events.
fn level_filter(level: &str) -> Result<String, ConfigError> {
    let level = level.to_ascii_lowercase();
    if !LEVELS.contains(&level.as_str()) {
        return Err(ConfigError::Parse {
            key: "LOG_LEVEL".into(),
            value: level,
            reason: format!("expected one of {}", LEVELS.join(", ")),
        });
    }
    Ok(format!("info,gantry={0},access={0}", level))
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,gantry=info,access=info".to_string(),
            service_name: "gantry".to_string(),
        }
    }
}
