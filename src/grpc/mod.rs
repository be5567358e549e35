//! RPC listener.
//!
//! Services are registered into a tonic [`RoutesBuilder`] before start and
//! served behind the interceptor layers:
//!
//! ```text
//! GrpcMetricsLayer → InterceptorChain → GrpcRecoveryLayer → routes
//! ```
//!
//! Accepted connections are tracked so a forced stop can cut them.
//!
//! # Example
//!
//! ```rust,ignore
//! use gantry::grpc::RpcSurface;
//!
//! let surface = RpcSurface::bind("127.0.0.1:0".parse()?)?;
//! surface.register(|routes| {
//!     routes.add_service(EchoServer::new(EchoImpl::default()));
//! });
//! surface.start(metrics, InterceptorChain::default(), None)?;
//! ```
//!
//! # Client example (grpcurl)
//!
//! ```bash
//! grpcurl -plaintext -d '{"message": "hi"}' localhost:8080 echo.v1.EchoService/Echo
//! ```

mod connection;
mod server;

pub use server::{RpcRegistrar, RpcSurface};
pub use tonic::service::RoutesBuilder;
