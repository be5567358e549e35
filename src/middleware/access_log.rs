//! Access logging middleware.
//!
//! Emits one structured event per gateway request on the `access` target.

use crate::core::{Context, Request, Response};
use crate::logging::ACCESS_TARGET;

use super::{Middleware, MiddlewareResult};

/// Access logging middleware.
///
/// Log entries are emitted at INFO level with target "access"; the JSON
/// formatter turns them into `type: "access"` lines. The request ID is
/// echoed back as `X-Request-ID`.
#[derive(Default)]
pub struct AccessLogMiddleware;

impl AccessLogMiddleware {
    /// Create a new access log middleware.
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for AccessLogMiddleware {
    fn name(&self) -> &'static str {
        "access_log"
    }

    fn on_request(&self, req: Request, ctx: &mut Context) -> MiddlewareResult {
        ctx.set("log_method", req.method().to_string());
        ctx.set("log_path", req.path().to_string());
        if let Some(query) = req.query() {
            ctx.set("log_query", query.to_string());
        }
        if let Some(ua) = req.user_agent() {
            ctx.set("log_ua", ua.to_string());
        }
        if let Some(xff) = req.header("x-forwarded-for") {
            ctx.set("log_xff", xff.to_string());
        }

        MiddlewareResult::Next(req)
    }

    fn on_response(&self, res: Response, ctx: &Context) -> Response {
        let text = |key: &str| ctx.get::<String>(key).map(|s| s.as_str());

        tracing::info!(
            target: ACCESS_TARGET,
            request_id = ctx.request_id.as_str(),
            method = text("log_method").unwrap_or("?"),
            path = text("log_path").unwrap_or("?"),
            query = text("log_query"),
            status = res.status().as_u16(),
            bytes = res.body_len() as u64,
            duration_ms = ctx.elapsed_ms(),
            ip = ctx.client_ip.map(tracing::field::display),
            ua = text("log_ua"),
            xff = text("log_xff"),
        );

        res.with_header("x-request-id", &ctx.request_id)
    }
}
