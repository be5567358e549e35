//! Core types for HTTP request/response handling.
//!
//! This module provides the fundamental types used by the gateway
//! middleware pipeline and the debug surface:
//!
//! - [`Request`] - buffered HTTP request
//! - [`Response`] - HTTP response with builder-style modifiers
//! - [`Context`] - request context for middleware communication
//! - [`Error`] - per-request translation errors

mod context;
mod error;
mod request;
mod response;

pub use context::{generate_request_id, Context};
pub use error::{Error, Result};
pub use request::{parse_query, Request};
pub use response::{HttpResponse, Response};
