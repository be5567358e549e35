//! Buffered response shared by the gateway and the debug surface.

use bytes::Bytes;
use http::header::{self, HeaderName};
use http::{HeaderMap, HeaderValue, StatusCode};
use http_body_util::Full;
use serde::Serialize;

const TEXT_PLAIN: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");
const TEXT_HTML: HeaderValue = HeaderValue::from_static("text/html; charset=utf-8");
const APPLICATION_JSON: HeaderValue = HeaderValue::from_static("application/json");

/// What hyper finally writes to the socket.
pub type HttpResponse = http::Response<Full<Bytes>>;

/// Status, headers and a fully buffered body.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// 200 with an untyped body.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::empty(StatusCode::OK).with_body(body)
    }

    pub fn text(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self::typed(status, TEXT_PLAIN, body.into())
    }

    pub fn html(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self::typed(status, TEXT_HTML, body.into())
    }

    /// Serialize `value`; a value that cannot be serialized becomes `{}`.
    pub fn json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_else(|_| b"{}".to_vec());
        Self::typed(status, APPLICATION_JSON, Bytes::from(body))
    }

    fn typed(status: StatusCode, content_type: HeaderValue, body: Bytes) -> Self {
        Self::empty(status)
            .with_header_value(header::CONTENT_TYPE, content_type)
            .with_body(body)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Header as text; `None` when absent or not visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn with_header_value(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set a header from strings, silently dropping invalid ones.
    pub fn with_header(self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let name = HeaderName::from_bytes(name.as_ref().as_bytes());
        let value = HeaderValue::from_str(value.as_ref());
        match (name, value) {
            (Ok(name), Ok(value)) => self.with_header_value(name, value),
            _ => self,
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn body_len(&self) -> usize {
        self.body.len()
    }
}

impl From<Response> for HttpResponse {
    fn from(res: Response) -> Self {
        let mut out = http::Response::new(Full::new(res.body));
        *out.status_mut() = res.status;
        *out.headers_mut() = res.headers;
        out
    }
}
