//! Test helpers: echo service, app harness and clients

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::future::BoxFuture;
use http::Method;
use reqwest::{Client, Response, StatusCode};
use tonic::body::{empty_body, BoxBody};
use tonic::codec::ProstCodec;
use tonic::server::{NamedService, UnaryService};
use tonic::transport::Endpoint;
use tonic::Status;

use gantry::lifecycle::BoundAddrs;
use gantry::validation::{MessageTemplates, RuleViolation, Validate, ValidatingCodec};
use gantry::{App, Config};

pub const ECHO_PATH: &str = "/echo.v1.EchoService/Echo";

#[derive(Clone, PartialEq, prost::Message, serde::Serialize, serde::Deserialize)]
pub struct EchoRequest {
    #[prost(string, tag = "1")]
    #[serde(default)]
    pub message: String,
    #[prost(uint32, tag = "2")]
    #[serde(default)]
    pub repeat: u32,
    #[prost(string, repeated, tag = "3")]
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Clone, PartialEq, prost::Message, serde::Serialize, serde::Deserialize)]
pub struct EchoResponse {
    #[prost(string, tag = "1")]
    pub message: String,
    #[prost(bool, tag = "2")]
    pub from_gateway: bool,
    #[prost(string, tag = "3")]
    pub authorization: String,
}

impl Validate for EchoRequest {
    fn validate(&self) -> Vec<RuleViolation> {
        let mut violations = Vec::new();
        if self.message.chars().count() < 3 {
            violations.push(
                RuleViolation::new("string.min_len", "value length must be at least 3 characters")
                    .field("message")
                    .rule_value(3),
            );
        }
        for (i, tag) in self.tags.iter().enumerate() {
            if tag.is_empty() {
                violations.push(
                    RuleViolation::new(
                        "string.min_len",
                        "value length must be at least 1 characters",
                    )
                    .field("tags")
                    .index(i as u64)
                    .rule_value(1),
                );
            }
        }
        violations
    }
}

/// Echo behaviour keyed by message:
/// `panic` panics, `internal` fails with a secret, `missing` is NotFound,
/// `slow:<ms>` sleeps first.
async fn echo(
    request: tonic::Request<EchoRequest>,
) -> Result<tonic::Response<EchoResponse>, Status> {
    let metadata = request.metadata().clone();
    let req = request.into_inner();

    match req.message.as_str() {
        "panic" => panic!("echo handler panicked"),
        "internal" => return Err(Status::internal("db password is hunter2")),
        "missing" => return Err(Status::not_found("nothing to echo")),
        msg => {
            if let Some(ms) = msg.strip_prefix("slow:") {
                let ms: u64 = ms.parse().unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
        }
    }

    let repeat = req.repeat.max(1) as usize;
    Ok(tonic::Response::new(EchoResponse {
        message: vec![req.message.as_str(); repeat].join(" "),
        from_gateway: metadata.contains_key("x-from-grpc-gateway"),
        authorization: metadata
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string(),
    }))
}

/// Hand-written equivalent of a generated tonic server.
#[derive(Clone)]
pub struct EchoServer {
    templates: Arc<MessageTemplates>,
}

impl EchoServer {
    pub fn new() -> Self {
        Self {
            templates: Arc::new(MessageTemplates::ru()),
        }
    }
}

impl NamedService for EchoServer {
    const NAME: &'static str = "echo.v1.EchoService";
}

struct EchoSvc;

impl UnaryService<EchoRequest> for EchoSvc {
    type Response = EchoResponse;
    type Future = BoxFuture<'static, Result<tonic::Response<EchoResponse>, Status>>;

    fn call(&mut self, request: tonic::Request<EchoRequest>) -> Self::Future {
        Box::pin(echo(request))
    }
}

impl tower::Service<http::Request<BoxBody>> for EchoServer {
    type Response = http::Response<BoxBody>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<BoxBody>) -> Self::Future {
        if req.uri().path() != ECHO_PATH {
            return Box::pin(async {
                let mut res = http::Response::new(empty_body());
                res.headers_mut().insert(
                    "grpc-status",
                    http::HeaderValue::from(tonic::Code::Unimplemented as i32),
                );
                res.headers_mut().insert(
                    http::header::CONTENT_TYPE,
                    http::HeaderValue::from_static("application/grpc"),
                );
                Ok(res)
            });
        }

        let codec = ValidatingCodec::<EchoResponse, EchoRequest>::with_templates(Arc::clone(
            &self.templates,
        ));
        Box::pin(async move {
            let mut grpc = tonic::server::Grpc::new(codec);
            Ok(grpc.unary(EchoSvc, req).await)
        })
    }
}

/// Config with ephemeral ports and short shutdown timings.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.server.endpoints = gantry::config::EndpointSet::ephemeral();
    config.server.metrics_namespace = "itest".into();
    config.lifecycle.drain_delay = Duration::from_millis(20);
    config.lifecycle.grace_timeout = Duration::from_secs(5);
    config.lifecycle.debug_grace_timeout = Duration::from_secs(1);
    config
}

/// Running app with the echo service and its gateway routes.
pub struct TestApp {
    pub app: App,
    pub addrs: BoundAddrs,
    pub client: Client,
}

#[allow(dead_code)]
impl TestApp {
    pub async fn start() -> Self {
        Self::start_with(test_config(), |_| {}).await
    }

    pub async fn start_with(config: Config, configure: impl FnOnce(&mut App)) -> Self {
        let mut app = App::new(config).expect("app");
        app.register_rpc(|routes| {
            routes.add_service(EchoServer::new());
        });
        app.register_gateway(|router| {
            router
                .unary::<EchoRequest, EchoResponse>(Method::POST, "/v1/echo", ECHO_PATH)
                .unary::<EchoRequest, EchoResponse>(Method::GET, "/v1/echo/{message}", ECHO_PATH);
        });
        configure(&mut app);

        let addrs = app.start().await.expect("start");
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self { app, addrs, client }
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addrs.http, path)
    }

    pub fn debug_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addrs.debug, path)
    }

    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.http_url(path))
            .send()
            .await
            .expect("GET request failed")
    }

    pub async fn post_json<T: serde::Serialize + ?Sized>(&self, path: &str, json: &T) -> Response {
        self.client
            .post(self.http_url(path))
            .json(json)
            .send()
            .await
            .expect("POST request failed")
    }

    pub async fn debug_get(&self, path: &str) -> Response {
        self.client
            .get(self.debug_url(path))
            .send()
            .await
            .expect("Debug GET request failed")
    }

    /// Call Echo directly over gRPC, bypassing the gateway.
    pub async fn grpc_echo(&self, message: &str) -> Result<EchoResponse, Status> {
        grpc_echo(self.addrs.rpc, message).await
    }

    pub async fn metrics_text(&self) -> String {
        self.debug_get("/metrics").await.text().await.expect("metrics body")
    }
}

pub async fn grpc_echo(addr: SocketAddr, message: &str) -> Result<EchoResponse, Status> {
    grpc_echo_with_metadata(addr, message, &[]).await
}

/// Call Echo directly with extra request metadata.
pub async fn grpc_echo_with_metadata(
    addr: SocketAddr,
    message: &str,
    metadata: &[(&'static str, &str)],
) -> Result<EchoResponse, Status> {
    let channel = Endpoint::from_shared(format!("http://{}", addr))
        .map_err(|e| Status::unavailable(e.to_string()))?
        .connect()
        .await
        .map_err(|e| Status::unavailable(e.to_string()))?;

    let mut grpc = tonic::client::Grpc::new(channel);
    grpc.ready()
        .await
        .map_err(|e| Status::unavailable(e.to_string()))?;

    let mut request = tonic::Request::new(EchoRequest {
        message: message.to_string(),
        repeat: 1,
        tags: Vec::new(),
    });
    for (key, value) in metadata {
        let value = value
            .parse()
            .map_err(|_| Status::invalid_argument("bad metadata value"))?;
        request.metadata_mut().insert(*key, value);
    }
    let codec = ProstCodec::<EchoRequest, EchoResponse>::default();
    let path = http::uri::PathAndQuery::from_static(ECHO_PATH);
    Ok(grpc.unary(request, path, codec).await?.into_inner())
}

/// Assert response status with a readable message.
pub fn assert_status(resp: &Response, expected: StatusCode) {
    assert_eq!(
        resp.status(),
        expected,
        "Expected status {}, got {}",
        expected,
        resp.status()
    );
}

/// Assert header value equality.
pub fn assert_header(resp: &Response, name: &str, expected: &str) {
    let value = resp
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert_eq!(value, expected, "Header {} mismatch", name);
}

/// Value of one sample line in Prometheus text output.
pub fn sample_value(metrics: &str, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
    metrics.lines().find_map(|line| {
        let rest = line.strip_prefix(name)?.strip_prefix('{')?;
        let (label_part, value) = rest.split_once("} ")?;
        labels
            .iter()
            .all(|(k, v)| label_part.contains(&format!("{}=\"{}\"", k, v)))
            .then(|| value.trim().parse().ok())
            .flatten()
    })
}
