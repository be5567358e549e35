//! User interceptors for the RPC surface.
//!
//! Interceptors run between [`GrpcMetricsLayer`](super::GrpcMetricsLayer)
//! and [`GrpcRecoveryLayer`](super::GrpcRecoveryLayer), in registration
//! order. A rejection is sent as a trailers-only response, so the metrics
//! layer still counts the call. A panicking interceptor rejects the call
//! with `Internal`.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use tonic::service::Interceptor;
use tonic::{Request, Status};
use tracing::error;

use crate::health::panic_message;

/// Boxed interceptor function.
pub type RpcInterceptor =
    Arc<dyn Fn(Request<()>) -> Result<Request<()>, Status> + Send + Sync + 'static>;

/// Ordered interceptors applied as one tonic [`Interceptor`].
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Arc<[RpcInterceptor]>,
}

impl InterceptorChain {
    pub fn new(interceptors: Vec<RpcInterceptor>) -> Self {
        Self {
            interceptors: interceptors.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }
}

impl Interceptor for InterceptorChain {
    fn call(&mut self, request: Request<()>) -> Result<Request<()>, Status> {
        self.interceptors
            .iter()
            .enumerate()
            .try_fold(request, |request, (position, interceptor)| {
                match std::panic::catch_unwind(AssertUnwindSafe(|| interceptor(request))) {
                    Ok(result) => result,
                    Err(panic) => {
                        error!(
                            interceptor = position,
                            panic = %panic_message(&panic),
                            "gRPC interceptor panicked"
                        );
                        Err(Status::internal("Internal"))
                    }
                }
            })
    }
}

impl FromIterator<RpcInterceptor> for InterceptorChain {
    fn from_iter<T: IntoIterator<Item = RpcInterceptor>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
