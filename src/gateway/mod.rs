//! HTTP/JSON gateway in front of the RPC listener.
//!
//! Each HTTP request matched by the [`GatewayRouter`] becomes exactly one
//! unary call over a loopback connection to the local RPC listener. RPC
//! failures are translated by [`status_response`].
//!
//! ```text
//! HTTP ─► HttpMetrics ─► MiddlewareChain ─► recover_http ─► GatewayRouter
//!                                                              │
//!                                   LoopbackClient (x-from-grpc-gateway) ─► RPC listener
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! app.register_gateway(|router| {
//!     router.unary::<EchoRequest, EchoResponse>(
//!         Method::POST,
//!         "/v1/echo/{message}",
//!         "/echo.v1.EchoService/Echo",
//!     );
//! });
//! ```

mod client;
mod errors;
mod router;
mod server;

pub use client::{forward_headers, loopback_target, LoopbackClient, METADATA_HEADER_PREFIX};
pub use errors::{
    error_response, field_errors, http_status, status_response, INTERNAL_ERROR_BODY, UNKNOWN_FIELD,
};
pub use router::{decode_message, GatewayRouter, PathParams, RouteHandler};
pub use server::{build_chain, GatewayPipeline};

/// Deferred route registration.
pub type GatewayRegistrar = Box<dyn FnOnce(&mut GatewayRouter) + Send>;
