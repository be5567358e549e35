//! Path-pattern router translating JSON requests into unary RPCs.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use http::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use super::client::LoopbackClient;
use super::errors::error_response;
use crate::core::{Error, Request, Response};
use crate::middleware::PATTERN_HEADER;

/// Values captured from `{name}` pattern segments.
pub type PathParams = HashMap<String, String>;

/// A gateway route handler.
pub trait RouteHandler: Send + Sync + 'static {
    fn call(&self, req: Request, params: PathParams) -> BoxFuture<'static, Response>;
}

impl<F, Fut> RouteHandler for F
where
    F: Fn(Request, PathParams) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn call(&self, req: Request, params: PathParams) -> BoxFuture<'static, Response> {
        Box::pin(self(req, params))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

struct Route {
    method: Method,
    pattern: String,
    segments: Vec<Segment>,
    handler: Arc<dyn RouteHandler>,
}

impl Route {
    fn matches(&self, parts: &[&str]) -> Option<PathParams> {
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = PathParams::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(lit) if lit == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(_) if part.is_empty() => return None,
                Segment::Param(name) => {
                    let value = percent_encoding::percent_decode_str(part)
                        .decode_utf8_lossy()
                        .into_owned();
                    params.insert(name.clone(), value);
                }
            }
        }
        Some(params)
    }
}

fn parse_pattern(pattern: &str) -> Vec<Segment> {
    split_path(pattern)
        .into_iter()
        .map(|part| match part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
            Some(name) => Segment::Param(name.to_string()),
            None => Segment::Literal(part.to_string()),
        })
        .collect()
}

fn split_path(path: &str) -> Vec<&str> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('/').collect()
    }
}

/// Routes registered by the application, tried in registration order.
pub struct GatewayRouter {
    routes: Vec<Route>,
    client: LoopbackClient,
}

impl GatewayRouter {
    pub fn new(client: LoopbackClient) -> Self {
        Self {
            routes: Vec::new(),
            client,
        }
    }

    /// Loopback client for custom handlers.
    pub fn client(&self) -> &LoopbackClient {
        &self.client
    }

    /// Register a custom handler.
    pub fn route<H: RouteHandler>(
        &mut self,
        method: Method,
        pattern: &str,
        handler: H,
    ) -> &mut Self {
        self.routes.push(Route {
            method,
            pattern: pattern.to_string(),
            segments: parse_pattern(pattern),
            handler: Arc::new(handler),
        });
        self
    }

    /// Register a JSON route forwarding to the unary RPC at `grpc_path`.
    ///
    /// The request message is built from the JSON body, then query
    /// parameters, then path parameters; later sources win on conflicts.
    pub fn unary<Req, Resp>(&mut self, method: Method, pattern: &str, grpc_path: &str) -> &mut Self
    where
        Req: prost::Message + DeserializeOwned + Default + Send + Sync + 'static,
        Resp: prost::Message + Serialize + Default + Send + Sync + 'static,
    {
        let client = self.client.clone();
        let grpc_path: Arc<str> = Arc::from(grpc_path);

        self.route(method, pattern, move |req: Request, params: PathParams| {
            let client = client.clone();
            let grpc_path = Arc::clone(&grpc_path);
            async move {
                match forward::<Req, Resp>(&client, &grpc_path, req, params).await {
                    Ok(res) => res,
                    Err(err) => error_response(&err),
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Registered `(method, pattern)` pairs.
    pub fn patterns(&self) -> Vec<(Method, &str)> {
        self.routes
            .iter()
            .map(|r| (r.method.clone(), r.pattern.as_str()))
            .collect()
    }

    /// Dispatch a request; the matched pattern is reported in [`PATTERN_HEADER`].
    pub async fn dispatch(&self, req: Request) -> Response {
        let parts = split_path(req.path());
        let mut path_matched = false;

        for route in &self.routes {
            let Some(params) = route.matches(&parts) else {
                continue;
            };
            if route.method != *req.method() {
                path_matched = true;
                continue;
            }

            let res = route.handler.call(req, params).await;
            return res.with_header(PATTERN_HEADER, &route.pattern);
        }

        if path_matched {
            route_error(
                StatusCode::METHOD_NOT_ALLOWED,
                tonic::Code::Unimplemented,
                "Method Not Allowed",
            )
        } else {
            route_error(StatusCode::NOT_FOUND, tonic::Code::NotFound, "Not Found")
        }
    }
}

fn route_error(status: StatusCode, code: tonic::Code, message: &str) -> Response {
    Response::json(
        status,
        &serde_json::json!({
            "code": code as i32,
            "message": message,
            "details": [],
        }),
    )
}

async fn forward<Req, Resp>(
    client: &LoopbackClient,
    grpc_path: &str,
    req: Request,
    params: PathParams,
) -> Result<Response, Error>
where
    Req: prost::Message + DeserializeOwned + Default + Send + Sync + 'static,
    Resp: prost::Message + Serialize + Default + Send + Sync + 'static,
{
    let query = req.query_params();
    let message: Req = decode_message(req.body(), &query, &params)?;

    let reply: Resp = client.unary(grpc_path, message, req.headers()).await?;
    let body = serde_json::to_vec(&reply).map_err(|e| Error::Encode(e.to_string()))?;

    Ok(Response::ok(body).with_header(http::header::CONTENT_TYPE, "application/json"))
}

/// Merge body, query and path values into one message.
///
/// Query and path values arrive as strings. If the message rejects them as
/// strings, they are retried as JSON scalars so numeric and boolean fields
/// bind too.
pub fn decode_message<T: DeserializeOwned>(
    body: &[u8],
    query: &HashMap<String, String>,
    params: &PathParams,
) -> Result<T, Error> {
    let mut object = if body.iter().all(u8::is_ascii_whitespace) {
        Map::new()
    } else {
        match serde_json::from_slice(body)? {
            Value::Object(map) => map,
            _ => return Err(Error::BadJson("request body must be a JSON object".into())),
        }
    };

    if query.is_empty() && params.is_empty() {
        return Ok(serde_json::from_value(Value::Object(object))?);
    }

    let base = object.clone();
    for (key, value) in query.iter().chain(params.iter()) {
        object.insert(key.clone(), Value::String(value.clone()));
    }
    match serde_json::from_value(Value::Object(object)) {
        Ok(message) => Ok(message),
        Err(first) => {
            let mut object = base;
            for (key, value) in query.iter().chain(params.iter()) {
                object.insert(key.clone(), scalar(value));
            }
            serde_json::from_value(Value::Object(object))
                .map_err(|_| Error::BadJson(first.to_string()))
        }
    }
}

fn scalar(raw: &str) -> Value {
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => serde_json::from_str::<serde_json::Number>(raw)
            .map(Value::Number)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
    }
}
