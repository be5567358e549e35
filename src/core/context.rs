//! Request context for the gateway middleware pipeline.

use std::any::Any;
use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Instant;

/// Request context shared across middleware and handlers.
///
/// Carries request-scoped data through the pipeline:
/// - Client information and the correlation ID
/// - Timing information
/// - Custom key-value storage for middleware communication
pub struct Context {
    /// Client IP address, if the peer is known.
    pub client_ip: Option<IpAddr>,

    /// Request ID for logging (propagated from X-Request-ID or generated).
    pub request_id: String,

    /// Request start time.
    pub started_at: Instant,

    /// Custom key-value storage for middleware.
    values: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl Context {
    /// Create a new context.
    #[inline]
    pub fn new(client_ip: Option<IpAddr>, request_id: impl Into<String>) -> Self {
        Self {
            client_ip,
            request_id: request_id.into(),
            started_at: Instant::now(),
            values: HashMap::new(),
        }
    }

    /// Create a context for a request, reusing its X-Request-ID when present.
    pub fn for_request(req: &super::Request) -> Self {
        let request_id = req
            .request_id()
            .filter(|id| !id.is_empty() && id.len() <= 128)
            .map(str::to_string)
            .unwrap_or_else(generate_request_id);
        Self::new(req.remote_addr().map(|a| a.ip()), request_id)
    }

    /// Set a custom value.
    #[inline]
    pub fn set<T: Send + Sync + 'static>(&mut self, key: &str, value: T) {
        self.values.insert(key.to_string(), Box::new(value));
    }

    /// Get a custom value.
    #[inline]
    pub fn get<T: 'static>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref())
    }

    /// Elapsed time since the request started, in milliseconds.
    #[inline]
    pub fn elapsed_ms(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64() * 1000.0
    }
}

/// Generate a short random request ID.
pub fn generate_request_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..16].to_string()
}
