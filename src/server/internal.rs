//! Debug surface: health probes, Prometheus metrics and API docs.
//!
//! Served on its own port, stopped last, and wrapped only in panic recovery
//! so probes keep answering while the public surfaces drain.
//!
//! | Path | Response |
//! |---|---|
//! | `/live` | liveness probe, `?full=1` for per-check detail |
//! | `/ready` | readiness probe (liveness checks included) |
//! | `/metrics` | Prometheus text exposition |
//! | `/docs/*` | [`DocsProvider`] |

use std::sync::Arc;

use http::{header, Method, StatusCode};

use super::{DocsProvider, HttpHandler};
use crate::core::{Request, Response};
use crate::health::{HealthRegistry, ProbeType};
use crate::middleware::recover_http;
use crate::observability::Metrics;

pub const LIVENESS_PATH: &str = "/live";
pub const READINESS_PATH: &str = "/ready";
pub const METRICS_PATH: &str = "/metrics";
pub const DOCS_PREFIX: &str = "/docs/";

/// Everything the debug routes read from.
pub struct DebugRoutes {
    health: Arc<HealthRegistry>,
    metrics: Arc<Metrics>,
    docs: Arc<dyn DocsProvider>,
}

impl DebugRoutes {
    pub fn new(
        health: Arc<HealthRegistry>,
        metrics: Arc<Metrics>,
        docs: Arc<dyn DocsProvider>,
    ) -> Self {
        Self {
            health,
            metrics,
            docs,
        }
    }

    /// Dispatch one debug request.
    pub async fn route(&self, req: Request) -> Response {
        match req.path() {
            LIVENESS_PATH => self.probe(&req, ProbeType::Liveness).await,
            READINESS_PATH => self.probe(&req, ProbeType::Readiness).await,
            METRICS_PATH => self.export_metrics(),
            "/docs" => Response::empty(StatusCode::MOVED_PERMANENTLY)
                .with_header(header::LOCATION, DOCS_PREFIX),
            path if path.starts_with(DOCS_PREFIX) => {
                if !matches!(*req.method(), Method::GET | Method::HEAD) {
                    return method_not_allowed();
                }
                self.docs.serve(&path[DOCS_PREFIX.len()..]).await
            }
            _ => Response::text(StatusCode::NOT_FOUND, "404 page not found\n"),
        }
    }

    async fn probe(&self, req: &Request, probe: ProbeType) -> Response {
        if *req.method() != Method::GET {
            return method_not_allowed();
        }

        let report = self.health.probe(probe).await;
        let full = req.query_params().get("full").is_some_and(|v| v == "1");
        let status = StatusCode::from_u16(report.status.http_status())
            .unwrap_or(StatusCode::SERVICE_UNAVAILABLE);

        Response::empty(status)
            .with_header(header::CONTENT_TYPE, "application/json; charset=utf-8")
            .with_header(header::CACHE_CONTROL, "no-cache, no-store, must-revalidate")
            .with_header(header::PRAGMA, "no-cache")
            .with_header(header::EXPIRES, "0")
            .with_body(report.to_body(full))
    }

    fn export_metrics(&self) -> Response {
        match self.metrics.export() {
            Ok(body) => Response::ok(body)
                .with_header(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8"),
            Err(e) => {
                tracing::error!(error = %e, "failed to encode metrics");
                Response::text(StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics\n")
            }
        }
    }
}

/// Handler for the debug surface: routes behind panic recovery.
pub fn debug_handler(routes: Arc<DebugRoutes>) -> HttpHandler {
    Arc::new(move |req: Request| {
        let routes = Arc::clone(&routes);
        Box::pin(async move {
            let path = req.path().to_string();
            recover_http(&path, routes.route(req)).await
        })
    })
}

fn method_not_allowed() -> Response {
    Response::text(StatusCode::METHOD_NOT_ALLOWED, "method not allowed\n")
}
