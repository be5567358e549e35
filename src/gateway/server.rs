//! Gateway request pipeline.

use std::sync::Arc;

use crate::config::{EndpointSet, MiddlewareConfig};
use crate::core::{Context, Request, Response};
use crate::middleware::{
    recover_http, AccessLogMiddleware, CorsMiddleware, HttpMetrics, Middleware, MiddlewareChain,
};
use crate::server::HttpHandler;

use super::GatewayRouter;

/// Access log, then CORS, then the user's middleware, outermost first.
pub fn build_chain(
    config: &MiddlewareConfig,
    endpoints: &EndpointSet,
    user: &[Arc<dyn Middleware>],
) -> MiddlewareChain {
    let mut builtin: Vec<Arc<dyn Middleware>> = Vec::new();
    if config.access_log {
        builtin.push(Arc::new(AccessLogMiddleware::new()));
    }
    if config.cors {
        builtin.push(Arc::new(CorsMiddleware::for_endpoints(endpoints)));
    }
    builtin.into_iter().chain(user.iter().cloned()).collect()
}

/// Metrics, then the middleware chain, then recovery around the router.
pub struct GatewayPipeline {
    metrics: HttpMetrics,
    chain: MiddlewareChain,
    router: GatewayRouter,
}

impl GatewayPipeline {
    pub fn new(metrics: HttpMetrics, chain: MiddlewareChain, router: GatewayRouter) -> Self {
        Self {
            metrics,
            chain,
            router,
        }
    }

    /// Run one request through every layer.
    pub async fn handle(&self, req: Request) -> Response {
        let chain = &self.chain;
        let router = &self.router;

        self.metrics
            .track(req, |req| async move {
                let mut ctx = Context::for_request(&req);
                chain
                    .process(req, &mut ctx, |req| async move {
                        let path = req.path().to_string();
                        recover_http(&path, router.dispatch(req)).await
                    })
                    .await
            })
            .await
    }

    /// Handler for an [`HttpSurface`](crate::server::HttpSurface).
    pub fn into_handler(self) -> HttpHandler {
        let pipeline = Arc::new(self);
        Arc::new(move |req: Request| {
            let pipeline = Arc::clone(&pipeline);
            Box::pin(async move { pipeline.handle(req).await })
        })
    }
}
