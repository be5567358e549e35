//! Middleware and interceptors for both transports.
//!
//! HTTP gateway pipeline, outermost first:
//!
//! ```text
//! HttpMetrics → MiddlewareChain (access log, CORS, user) → recover_http → router
//! ```
//!
//! gRPC listener layers, outermost first:
//!
//! ```text
//! GrpcMetricsLayer → InterceptorChain (user) → GrpcRecoveryLayer → service
//! ```
//!
//! Recovery is innermost and never re-raises: a handler panic still flows
//! out through the middleware and metrics as an internal error.
//!
//! # Example
//!
//! ```rust,ignore
//! use gantry::middleware::{Middleware, MiddlewareResult};
//! use gantry::core::{Request, Response, Context};
//!
//! struct TenantHeader;
//!
//! impl Middleware for TenantHeader {
//!     fn name(&self) -> &'static str { "tenant" }
//!
//!     fn on_request(&self, req: Request, _ctx: &mut Context) -> MiddlewareResult {
//!         if req.header("x-tenant").is_none() {
//!             return MiddlewareResult::Stop(Response::text(StatusCode::BAD_REQUEST, "tenant required"));
//!         }
//!         MiddlewareResult::Next(req)
//!     }
//! }
//!
//! app.use_middleware(TenantHeader);
//! ```

mod chain;

pub mod access_log;
pub mod cors;
pub mod interceptor;
pub mod metrics;
pub mod recovery;

pub use access_log::AccessLogMiddleware;
pub use chain::MiddlewareChain;
pub use cors::CorsMiddleware;
pub use interceptor::{InterceptorChain, RpcInterceptor};
pub use metrics::{GrpcMetricsLayer, HttpMetrics, FROM_GATEWAY_HEADER, PATTERN_HEADER};
pub use recovery::{recover_http, GrpcRecoveryLayer};

use crate::core::{Context, Request, Response};

/// Outcome of a request hook.
#[derive(Debug)]
pub enum MiddlewareResult {
    /// Hand the (possibly rewritten) request to the next layer.
    Next(Request),
    /// Answer now; inner layers and the router are skipped.
    Stop(Response),
}

impl MiddlewareResult {
    pub fn is_next(&self) -> bool {
        matches!(self, MiddlewareResult::Next(_))
    }

    pub fn is_stop(&self) -> bool {
        matches!(self, MiddlewareResult::Stop(_))
    }
}

/// A gateway middleware.
///
/// Runs inside the metrics layer and outside panic recovery, so its
/// responses are counted and a panicking handler still passes through
/// `on_response`.
///
/// ```text
/// Request → A.on_request → B.on_request → router
///                                           ↓
/// Response ← A.on_response ← B.on_response ←┘
/// ```
pub trait Middleware: Send + Sync {
    /// Name shown in logs.
    fn name(&self) -> &'static str;

    fn on_request(&self, req: Request, _ctx: &mut Context) -> MiddlewareResult {
        MiddlewareResult::Next(req)
    }

    fn on_response(&self, res: Response, _ctx: &Context) -> Response {
        res
    }
}
