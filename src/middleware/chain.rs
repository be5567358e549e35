//! Ordered onion of gateway middleware.

use std::future::Future;
use std::sync::Arc;

use super::{Middleware, MiddlewareResult};
use crate::core::{Context, Request, Response};

/// Middleware in registration order: the first one registered is outermost.
///
/// Only middleware whose `on_request` ran get to see the response, so a
/// short-circuit is unwound by the layers outside it and nothing else.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    layers: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware inside the ones already registered.
    pub fn add<M: Middleware + 'static>(self, middleware: M) -> Self {
        self.with(Arc::new(middleware))
    }

    /// Append a shared middleware.
    pub fn with(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.layers.push(middleware);
        self
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Names, outermost first.
    pub fn names(&self) -> Vec<&'static str> {
        self.layers.iter().map(|m| m.name()).collect()
    }

    /// Run request hooks outside-in.
    ///
    /// Returns how many layers were entered together with the outcome.
    fn enter(&self, mut req: Request, ctx: &mut Context) -> (usize, MiddlewareResult) {
        for (depth, layer) in self.layers.iter().enumerate() {
            req = match layer.on_request(req, ctx) {
                MiddlewareResult::Next(req) => req,
                MiddlewareResult::Stop(res) => {
                    tracing::debug!(
                        middleware = layer.name(),
                        status = %res.status(),
                        "request answered by middleware"
                    );
                    return (depth + 1, MiddlewareResult::Stop(res));
                }
            };
        }
        (self.layers.len(), MiddlewareResult::Next(req))
    }

    /// Run response hooks of the first `depth` layers inside-out.
    fn leave(&self, depth: usize, res: Response, ctx: &Context) -> Response {
        self.layers[..depth]
            .iter()
            .rev()
            .fold(res, |res, layer| layer.on_response(res, ctx))
    }

    /// Wrap `handler` in every layer.
    pub async fn process<F, Fut>(&self, req: Request, ctx: &mut Context, handler: F) -> Response
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = Response>,
    {
        let (depth, outcome) = self.enter(req, ctx);
        let res = match outcome {
            MiddlewareResult::Next(req) => handler(req).await,
            MiddlewareResult::Stop(res) => res,
        };
        self.leave(depth, res, ctx)
    }
}

impl FromIterator<Arc<dyn Middleware>> for MiddlewareChain {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Middleware>>>(iter: I) -> Self {
        Self {
            layers: iter.into_iter().collect(),
        }
    }
}
