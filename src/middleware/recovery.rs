//! Panic recovery for both transports.
//!
//! A panic inside a handler becomes a standard internal-error response and
//! a log entry; it never unwinds past this layer.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use http::{HeaderValue, StatusCode};
use tower::{Layer, Service};
use tracing::error;

use crate::core::Response;
use crate::health::panic_message;

/// Run an HTTP handler future, converting a panic into a 500 response.
///
/// The body mirrors the gateway's gRPC error shape:
/// `{"code":13,"message":"Internal","details":[]}`.
pub async fn recover_http<Fut>(path: &str, fut: Fut) -> Response
where
    Fut: Future<Output = Response>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(res) => res,
        Err(panic) => {
            error!(path = %path, panic = %panic_message(&panic), "HTTP handler panicked");
            internal_error_response()
        }
    }
}

/// Response sent when an HTTP handler panics.
pub fn internal_error_response() -> Response {
    Response::json(
        StatusCode::INTERNAL_SERVER_ERROR,
        &serde_json::json!({
            "code": tonic::Code::Internal as i32,
            "message": "Internal",
            "details": [],
        }),
    )
}

/// Tower layer converting gRPC handler panics into `grpc-status: 13`.
#[derive(Clone, Copy, Debug, Default)]
pub struct GrpcRecoveryLayer;

impl<S> Layer<S> for GrpcRecoveryLayer {
    type Service = GrpcRecoveryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GrpcRecoveryService { inner }
    }
}

/// Service produced by [`GrpcRecoveryLayer`].
#[derive(Clone)]
pub struct GrpcRecoveryService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<http::Request<ReqBody>> for GrpcRecoveryService<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ResBody: Default + Send + 'static,
{
    type Response = http::Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        let method = req.uri().path().to_string();

        // Handlers may panic while building their future, before any await
        let fut = match std::panic::catch_unwind(AssertUnwindSafe(|| self.inner.call(req))) {
            Ok(fut) => fut,
            Err(panic) => {
                log_panic(&method, &panic);
                return futures_util::future::ready(Ok(grpc_internal_response())).boxed();
            }
        };

        Box::pin(async move {
            match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => {
                    log_panic(&method, &panic);
                    Ok(grpc_internal_response())
                }
            }
        })
    }
}

fn log_panic(method: &str, panic: &Box<dyn std::any::Any + Send>) {
    error!(method = %method, panic = %panic_message(panic), "gRPC handler panicked");
}

/// Trailers-only gRPC response with status Internal.
fn grpc_internal_response<B: Default>() -> http::Response<B> {
    let mut res = http::Response::new(B::default());
    let headers = res.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        HeaderValue::from_static("application/grpc"),
    );
    headers.insert("grpc-status", HeaderValue::from(tonic::Code::Internal as i32));
    headers.insert("grpc-message", HeaderValue::from_static("Internal"));
    res
}
