//! Gateway middleware configuration.

use super::parse::env_bool;
use super::ConfigError;

/// Middleware configuration loaded from environment.
#[derive(Clone, Debug)]
pub struct MiddlewareConfig {
    /// Access logging enabled.
    pub access_log: bool,
    /// CORS headers for the docs UI origin.
    pub cors: bool,
}

impl MiddlewareConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            access_log: env_bool("ACCESS_LOG", false)?,
            cors: env_bool("CORS", true)?,
        })
    }
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            access_log: false,
            cors: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MiddlewareConfig::default();
        assert!(!config.access_log);
        assert!(config.cors);
    }

    #[test]
    fn test_access_log_flag() {
        let _guard = crate::config::ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        std::env::set_var("ACCESS_LOG", "true");
        std::env::set_var("CORS", "0");
        let config = MiddlewareConfig::from_env().unwrap();
        assert!(config.access_log);
        assert!(!config.cors);
        std::env::remove_var("ACCESS_LOG");
        std::env::remove_var("CORS");
    }
}
