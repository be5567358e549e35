//! CORS middleware for the documentation UI.
//!
//! The docs UI is served from the debug surface and calls the gateway from
//! the browser, so the debug origin is the one allowed cross-origin caller.

use http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_METHOD, VARY,
};
use http::{HeaderValue, Method, StatusCode};

use super::{Middleware, MiddlewareResult};
use crate::config::EndpointSet;
use crate::core::{Context, Request, Response};

const ALLOWED_METHODS: &str = "HEAD, GET, POST, PUT, DELETE, OPTIONS";
const CTX_ORIGIN: &str = "cors_origin";

/// Answers preflight requests and decorates responses for allowed origins.
pub struct CorsMiddleware {
    allowed_origins: Vec<String>,
}

impl CorsMiddleware {
    /// Allow the given origins verbatim.
    pub fn new(allowed_origins: Vec<String>) -> Self {
        Self { allowed_origins }
    }

    /// Allow `http(s)://{domain}:{debug_port}`.
    pub fn for_endpoints(endpoints: &EndpointSet) -> Self {
        let port = endpoints.debug.port();
        Self::new(vec![
            format!("http://{}:{}", endpoints.domain, port),
            format!("https://{}:{}", endpoints.domain, port),
        ])
    }

    fn is_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|o| o == origin)
    }

    fn decorate(res: Response, origin: &str) -> Response {
        let Ok(origin) = HeaderValue::from_str(origin) else {
            return res;
        };
        res.with_header_value(ACCESS_CONTROL_ALLOW_ORIGIN, origin)
            .with_header_value(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"))
            .with_header_value(VARY, HeaderValue::from_static("Origin"))
    }
}

impl Middleware for CorsMiddleware {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn on_request(&self, req: Request, ctx: &mut Context) -> MiddlewareResult {
        let Some(origin) = req.origin().filter(|o| self.is_allowed(o)) else {
            return MiddlewareResult::Next(req);
        };
        let origin = origin.to_string();

        let preflight = req.method() == Method::OPTIONS
            && req.headers().contains_key(ACCESS_CONTROL_REQUEST_METHOD);
        if preflight {
            let res = Response::empty(StatusCode::NO_CONTENT)
                .with_header_value(
                    ACCESS_CONTROL_ALLOW_METHODS,
                    HeaderValue::from_static(ALLOWED_METHODS),
                )
                .with_header_value(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
            ctx.set(CTX_ORIGIN, origin);
            return MiddlewareResult::Stop(res);
        }

        ctx.set(CTX_ORIGIN, origin);
        MiddlewareResult::Next(req)
    }

    fn on_response(&self, res: Response, ctx: &Context) -> Response {
        match ctx.get::<String>(CTX_ORIGIN) {
            Some(origin) => Self::decorate(res, origin),
            None => res,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::MiddlewareChain;
    use bytes::Bytes;
    use http::HeaderMap;

    fn cors() -> CorsMiddleware {
        let mut endpoints = EndpointSet::default();
        endpoints.domain = "api.example.com".into();
        CorsMiddleware::for_endpoints(&endpoints)
    }

    fn request(method: Method, origin: &str, preflight: bool) -> Request {
        let mut headers = HeaderMap::new();
        headers.insert("origin", origin.parse().unwrap());
        if preflight {
            headers.insert("access-control-request-method", "POST".parse().unwrap());
        }
        Request::new(method, "/v1/echo".parse().unwrap(), headers, Bytes::new())
    }

    #[tokio::test]
    async fn test_preflight_from_docs_origin() {
        let chain = MiddlewareChain::new().add(cors());
        let req = request(Method::OPTIONS, "http://api.example.com:8084", true);
        let mut ctx = Context::new(None, "req");

        let res = chain
            .process(req, &mut ctx, |_| async { Response::ok("handler") })
            .await;

        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            res.header("access-control-allow-origin"),
            Some("http://api.example.com:8084")
        );
        assert_eq!(res.header("access-control-allow-credentials"), Some("true"));
        assert_eq!(res.header("access-control-allow-methods"), Some(ALLOWED_METHODS));
        assert_eq!(res.header("access-control-allow-headers"), Some("*"));
    }

    #[tokio::test]
    async fn test_simple_request_is_decorated() {
        let chain = MiddlewareChain::new().add(cors());
        let req = request(Method::POST, "https://api.example.com:8084", false);
        let mut ctx = Context::new(None, "req");

        let res = chain
            .process(req, &mut ctx, |_| async { Response::ok("handler") })
            .await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.header("access-control-allow-origin"),
            Some("https://api.example.com:8084")
        );
    }

    #[tokio::test]
    async fn test_foreign_origin_is_ignored() {
        let chain = MiddlewareChain::new().add(cors());
        let req = request(Method::OPTIONS, "http://evil.example.com", true);
        let mut ctx = Context::new(None, "req");

        let res = chain
            .process(req, &mut ctx, |_| async { Response::ok("handler") })
            .await;

        assert_eq!(res.body().as_ref(), b"handler");
        assert!(res.header("access-control-allow-origin").is_none());
    }
}
