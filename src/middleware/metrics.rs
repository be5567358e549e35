//! Request metrics for both transports.
//!
//! HTTP requests are labeled `HTTP {METHOD}: {route}`, where the route is the
//! matched pattern reported by the router through the [`PATTERN_HEADER`]
//! response header (removed before the response leaves), so path parameters
//! do not blow up label cardinality. gRPC calls are labeled by method name.
//!
//! Calls synthesized by the gateway carry [`FROM_GATEWAY_HEADER`] and are
//! skipped on the gRPC side: the HTTP layer already counted them once.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use futures_util::future::BoxFuture;
use http::HeaderMap;
use http_body::{Body, Frame, SizeHint};
use tower::{Layer, Service};

use crate::core::{Request, Response};
use crate::observability::{
    grpc_bucket, http_bucket, normalize_path, Metrics, StatusBucket, PROTOCOL_GRPC, PROTOCOL_HTTP,
};

/// Response header carrying the matched route pattern.
pub const PATTERN_HEADER: &str = "pattern";

/// Metadata key marking calls that originate from the HTTP gateway.
pub const FROM_GATEWAY_HEADER: &str = "x-from-grpc-gateway";

/// Outermost HTTP layer: one counter increment and one latency sample per request.
#[derive(Clone)]
pub struct HttpMetrics {
    metrics: Arc<Metrics>,
}

impl HttpMetrics {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }

    /// Run the rest of the pipeline and record its outcome.
    pub async fn track<F, Fut>(&self, req: Request, next: F) -> Response
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = Response>,
    {
        let started = Instant::now();
        let method = req.method().clone();
        let path = req.path().to_string();

        let mut res = next(req).await;

        let route = res
            .headers_mut()
            .remove(PATTERN_HEADER)
            .and_then(|v| v.to_str().ok().map(str::to_string))
            .unwrap_or_else(|| normalize_path(&path));
        let handler = http_handler_name(method.as_str(), &route);

        self.metrics.observe(
            &handler,
            PROTOCOL_HTTP,
            http_bucket(res.status().as_u16()),
            started.elapsed(),
        );
        res
    }
}

/// Label value for an HTTP route.
pub fn http_handler_name(method: &str, route: &str) -> String {
    format!("HTTP {}: {}", method, route)
}

/// Label value for a gRPC path: the method name after the last slash.
pub fn grpc_handler_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn grpc_status(headers: &HeaderMap) -> Option<i32> {
    headers
        .get("grpc-status")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Tower layer recording gRPC call metrics; install it outermost.
#[derive(Clone)]
pub struct GrpcMetricsLayer {
    metrics: Arc<Metrics>,
}

impl GrpcMetricsLayer {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }
}

impl<S> Layer<S> for GrpcMetricsLayer {
    type Service = GrpcMetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GrpcMetricsService {
            inner,
            metrics: Arc::clone(&self.metrics),
        }
    }
}

/// Service produced by [`GrpcMetricsLayer`].
#[derive(Clone)]
pub struct GrpcMetricsService<S> {
    inner: S,
    metrics: Arc<Metrics>,
}

impl<S, ReqBody, ResBody> Service<http::Request<ReqBody>> for GrpcMetricsService<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ResBody: Body + Unpin + Send + 'static,
{
    type Response = http::Response<MetricsBody<ResBody>>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        let recorder = (!req.headers().contains_key(FROM_GATEWAY_HEADER)).then(|| Recorder {
            metrics: Arc::clone(&self.metrics),
            handler: grpc_handler_name(req.uri().path()).to_string(),
            started: Instant::now(),
        });
        let fut = self.inner.call(req);

        Box::pin(async move {
            match fut.await {
                Ok(res) => {
                    let (parts, body) = res.into_parts();
                    let mut recorder = recorder;
                    // Trailers-only responses carry the status in the headers
                    if let Some(code) = grpc_status(&parts.headers) {
                        if let Some(recorder) = recorder.take() {
                            recorder.finish(grpc_bucket(code));
                        }
                    }
                    Ok(http::Response::from_parts(
                        parts,
                        MetricsBody {
                            inner: body,
                            recorder,
                        },
                    ))
                }
                Err(err) => {
                    if let Some(recorder) = recorder {
                        recorder.finish(StatusBucket::Unknown);
                    }
                    Err(err)
                }
            }
        })
    }
}

struct Recorder {
    metrics: Arc<Metrics>,
    handler: String,
    started: Instant,
}

impl Recorder {
    fn finish(self, bucket: StatusBucket) {
        self.metrics
            .observe(&self.handler, PROTOCOL_GRPC, bucket, self.started.elapsed());
    }
}

/// Response body that records the call once its status trailer is seen.
///
/// A body dropped before completion counts as a cancelled call.
pub struct MetricsBody<B> {
    inner: B,
    recorder: Option<Recorder>,
}

impl<B> MetricsBody<B> {
    fn finish(&mut self, bucket: StatusBucket) {
        if let Some(recorder) = self.recorder.take() {
            recorder.finish(bucket);
        }
    }
}

impl<B: Body + Unpin> Body for MetricsBody<B> {
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);

        match &polled {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(code) = frame.trailers_ref().and_then(grpc_status) {
                    this.finish(grpc_bucket(code));
                }
            }
            Poll::Ready(Some(Err(_))) => this.finish(StatusBucket::Unknown),
            // Stream ended without a status trailer
            Poll::Ready(None) => this.finish(StatusBucket::Unknown),
            Poll::Pending => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl<B> Drop for MetricsBody<B> {
    fn drop(&mut self) {
        self.finish(grpc_bucket(tonic::Code::Cancelled as i32));
    }
}
