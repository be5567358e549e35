//! Errors raised while reading configuration.

use std::fmt;

/// A configuration variable that could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The variable is set but its value does not parse.
    Parse {
        key: String,
        value: String,
        reason: String,
    },
    /// The value parses but breaks a constraint.
    Invalid { key: String, message: String },
}

impl ConfigError {
    /// Name of the offending variable.
    pub fn key(&self) -> &str {
        match self {
            ConfigError::Parse { key, .. } | ConfigError::Invalid { key, .. } => key,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse { key, value, reason } => {
                write!(f, "{}={:?}: {}", key, value, reason)
            }
            ConfigError::Invalid { key, message } => write!(f, "{}: {}", key, message),
        }
    }
}

impl std::error::Error for ConfigError {}
