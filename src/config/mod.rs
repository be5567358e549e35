//! Configuration module for gantry.
//!
//! This module provides centralized configuration loading from environment variables.
//!
//! # Example
//!
//! ```rust,ignore
//! use gantry::config::Config;
//!
//! let config = Config::from_env()?;
//! println!("gRPC address: {}", config.server.endpoints.rpc);
//! ```

mod error;
mod lifecycle;
mod logging;
mod middleware;
mod parse;
mod server;

pub use error::ConfigError;
pub use lifecycle::LifecycleConfig;
pub use logging::LoggingConfig;
pub use middleware::MiddlewareConfig;
pub use parse::parse_duration;
pub use server::{sanitize_namespace, EndpointSet, ServerConfig};

/// Complete application configuration.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Listener configuration.
    pub server: ServerConfig,
    /// Shutdown and health timings.
    pub lifecycle: LifecycleConfig,
    /// Gateway middleware configuration.
    pub middleware: MiddlewareConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_env()?,
            lifecycle: LifecycleConfig::from_env()?,
            middleware: MiddlewareConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Print configuration summary to log.
    pub fn log_summary(&self) {
        use tracing::info;

        let endpoints = &self.server.endpoints;
        info!("Configuration loaded:");
        info!("  Service: {}", endpoints.service_name);
        info!("  gRPC: {}", endpoints.rpc);
        info!("  HTTP gateway: {}", endpoints.http);
        info!("  Debug: {}", endpoints.debug);
        info!("  Docs dir: {:?}", self.server.docs_dir);
        info!(
            "  Drain delay: {:?}, grace: {:?}, debug grace: {:?}",
            self.lifecycle.drain_delay,
            self.lifecycle.grace_timeout,
            self.lifecycle.debug_grace_timeout
        );

        match self.lifecycle.health_check_timeout {
            Some(timeout) => info!("  Health check timeout: {:?}", timeout),
            None => info!("  Health check timeout: disabled"),
        }

        if self.middleware.access_log {
            info!("  Access log: enabled");
        }
    }
}

/// Serializes tests that mutate process environment.
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
