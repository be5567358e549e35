//! gantry - service runtime core: gRPC listener, HTTP/JSON gateway and
//! debug surface under one lifecycle.
//!
//! The crate hosts three network surfaces:
//!
//! - **RPC listener** (`GRPC_PORT`): tonic server for the registered services
//! - **HTTP gateway** (`HTTP_PORT`): JSON routes proxied over a loopback
//!   gRPC connection
//! - **Debug surface** (`DEBUG_PORT`): `/live`, `/ready`, `/metrics`, `/docs/`
//!
//! # Features
//!
//! - **Health aggregation**: concurrent checks with panic isolation
//! - **Metrics**: Prometheus request counters and latency histograms for
//!   both protocols, gateway calls counted once
//! - **Middleware**: metrics outermost, user middleware, recovery innermost
//! - **Validation**: structured field violations mapped to HTTP 400 bodies
//! - **Lifecycle**: drain delay, per-surface grace deadline, forced stop
//!
//! # Example
//!
//! ```rust,ignore
//! use gantry::{App, Config};
//!
//! let mut app = App::new(Config::from_env()?)?;
//! app.register_rpc(|routes| {
//!     routes.add_service(EchoServer::new(EchoImpl));
//! });
//! app.run().await?;
//! ```

/// Package version from Cargo.toml
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// `BUILD_VERSION` from the build environment, else the git short hash
pub const BUILD_VERSION: &str = env!("BUILD_VERSION");

/// Full version string, e.g. "0.1.0 (abc1234)"
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_VERSION"), ")");

pub mod config;
pub mod core;
pub mod gateway;
pub mod grpc;
pub mod health;
pub mod lifecycle;
pub mod logging;
pub mod middleware;
pub mod observability;
pub mod server;
pub mod validation;

// Re-exports for convenience
pub use config::Config;
pub use lifecycle::{App, LifecycleError, LifecycleState, ShutdownReport, StartupError};
