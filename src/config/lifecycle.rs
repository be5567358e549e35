//! Shutdown and health timing configuration.

use std::time::Duration;

use super::parse::env_duration;
use super::ConfigError;

/// Timings used by the orchestrator and the health aggregator.
#[derive(Clone, Debug)]
pub struct LifecycleConfig {
    /// Wait after the termination signal before any surface is stopped.
    pub drain_delay: Duration,
    /// Graceful-stop deadline for each public surface.
    pub grace_timeout: Duration,
    /// Graceful-stop deadline for the debug surface.
    pub debug_grace_timeout: Duration,
    /// Optional per-check timeout; None keeps probes un-timeboxed.
    pub health_check_timeout: Option<Duration>,
}

impl LifecycleConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            drain_delay: env_duration("DRAIN_DELAY", "3s")?.unwrap_or(Duration::ZERO),
            grace_timeout: required_deadline("GRACE_TIMEOUT", "10s")?,
            debug_grace_timeout: required_deadline("DEBUG_GRACE_TIMEOUT", "1s")?,
            health_check_timeout: env_duration("HEALTH_CHECK_TIMEOUT", "off")?,
        })
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            drain_delay: Duration::from_secs(3),
            grace_timeout: Duration::from_secs(10),
            debug_grace_timeout: Duration::from_secs(1),
            health_check_timeout: None,
        }
    }
}

// Shutdown must always be bounded, so "off" is not accepted here.
fn required_deadline(key: &str, default: &str) -> Result<Duration, ConfigError> {
    env_duration(key, default)?.ok_or_else(|| ConfigError::Invalid {
        key: key.into(),
        message: "a non-zero deadline is required".into(),
    })
}
