//! Listener configuration.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use super::parse::{env_opt, env_or, env_parse};
use super::ConfigError;

/// Addresses of the three surfaces plus the metadata used by docs and CORS.
///
/// Immutable once constructed; the orchestrator hands out clones.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointSet {
    /// gRPC listener address.
    pub rpc: SocketAddr,
    /// HTTP/JSON gateway address.
    pub http: SocketAddr,
    /// Debug/ops surface address.
    pub debug: SocketAddr,
    /// Public domain (docs host, CORS origins).
    pub domain: String,
    /// Service name (docs header, log context).
    pub service_name: String,
}

impl EndpointSet {
    /// All three surfaces on one host.
    pub fn new(host: IpAddr, rpc_port: u16, http_port: u16, debug_port: u16) -> Self {
        Self {
            rpc: SocketAddr::new(host, rpc_port),
            http: SocketAddr::new(host, http_port),
            debug: SocketAddr::new(host, debug_port),
            domain: "localhost".to_string(),
            service_name: "gantry".to_string(),
        }
    }

    /// Loopback variant on ephemeral ports.
    pub fn ephemeral() -> Self {
        Self::new(IpAddr::from([127, 0, 0, 1]), 0, 0, 0)
    }
}

impl Default for EndpointSet {
    fn default() -> Self {
        Self::new(IpAddr::from([0, 0, 0, 0]), 8080, 8082, 8084)
    }
}

/// Server configuration loaded from environment.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listener addresses.
    pub endpoints: EndpointSet,
    /// Static documentation directory served under /docs/.
    pub docs_dir: PathBuf,
    /// Gateway request body limit in bytes.
    pub max_body_size: usize,
    /// Prometheus metric name prefix.
    pub metrics_namespace: String,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host: IpAddr = env_parse("LISTEN_HOST", IpAddr::from([0, 0, 0, 0]))?;
        let grpc_port = env_parse("GRPC_PORT", 8080u16)?;
        let http_port = env_parse("HTTP_PORT", 8082u16)?;
        let debug_port = env_parse("DEBUG_PORT", 8084u16)?;

        let mut endpoints = EndpointSet::new(host, grpc_port, http_port, debug_port);
        endpoints.domain = env_or("DOMAIN", "localhost");
        endpoints.service_name = env_or("SERVICE_NAME", "gantry");

        // Port 0 (ephemeral) may repeat, anything else must be unique
        let ports = [grpc_port, http_port, debug_port];
        let clash = ports
            .iter()
            .enumerate()
            .any(|(i, p)| *p != 0 && ports[i + 1..].contains(p));
        if clash {
            return Err(ConfigError::Invalid {
                key: "GRPC_PORT/HTTP_PORT/DEBUG_PORT".into(),
                message: format!(
                    "ports must differ (grpc={}, http={}, debug={})",
                    grpc_port, http_port, debug_port
                ),
            });
        }

        let metrics_namespace = env_opt("METRICS_NAMESPACE")
            .unwrap_or_else(|| sanitize_namespace(&endpoints.service_name));

        Ok(Self {
            endpoints,
            docs_dir: PathBuf::from(env_or("DOCS_DIR", "./docs")),
            max_body_size: env_parse("MAX_BODY_SIZE", 4 * 1024 * 1024)?,
            metrics_namespace,
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            endpoints: EndpointSet::default(),
            docs_dir: PathBuf::from("./docs"),
            max_body_size: 4 * 1024 * 1024,
            metrics_namespace: "gantry".to_string(),
        }
    }
}

/// Turn a service name into a valid Prometheus metric prefix.
pub fn sanitize_namespace(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}
