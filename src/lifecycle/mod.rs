//! Lifecycle orchestrator.
//!
//! [`App`] owns the three surfaces and drives them through
//!
//! ```text
//! Starting → Running → Draining → StoppingPublic → StoppingDebug → Terminated
//! ```
//!
//! Startup binds every listener before serving anything; a bind or dial
//! failure is fatal. Shutdown waits the drain delay (probes and traffic
//! keep being served), stops the gateway and then the RPC listener, each
//! within the grace timeout and forced after it, then the debug surface,
//! then generic closers. Shutdown runs once; later calls are rejected.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut app = App::new(Config::from_env()?)?;
//! app.health().add_readiness_check("db", move || db.ping());
//! app.register_rpc(|routes| {
//!     routes.add_service(EchoServer::new(EchoImpl));
//! });
//! app.register_gateway(|router| {
//!     router.unary::<EchoRequest, EchoResponse>(Method::POST, "/v1/echo", "/echo.v1.EchoService/Echo");
//! });
//! let report = app.run().await?;
//! ```

mod closer;
mod error;
mod signals;
mod state;

pub use closer::{stop_surface, Closer};
pub use error::{LifecycleError, ShutdownError, StartupError};
pub use signals::shutdown_signal;
pub use state::{LifecycleState, StateMachine};

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::config::{Config, EndpointSet};
use crate::gateway::{build_chain, GatewayPipeline, GatewayRegistrar, GatewayRouter, LoopbackClient};
use crate::grpc::{RoutesBuilder, RpcRegistrar, RpcSurface};
use crate::health::HealthRegistry;
use crate::middleware::{HttpMetrics, InterceptorChain, Middleware, RpcInterceptor};
use crate::observability::Metrics;
use crate::server::{
    debug_handler, DebugRoutes, DocsProvider, ExitSender, HttpSurface, ServeOptions, Surface,
    SwaggerDocs,
};

/// Body limit on the debug surface.
const DEBUG_MAX_BODY_SIZE: usize = 64 * 1024;

/// Addresses the surfaces actually bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundAddrs {
    pub rpc: SocketAddr,
    pub http: SocketAddr,
    pub debug: SocketAddr,
}

/// What went wrong during shutdown; empty when everything stopped cleanly.
#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
    pub errors: Vec<ShutdownError>,
    pub elapsed: Duration,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Hooks that missed their deadline.
    pub fn timed_out(&self) -> Vec<&str> {
        self.errors
            .iter()
            .filter(|e| e.is_timeout())
            .map(ShutdownError::hook)
            .collect()
    }
}

/// The service runtime.
pub struct App {
    config: Config,
    health: Arc<HealthRegistry>,
    metrics: Arc<Metrics>,
    docs: Option<Arc<dyn DocsProvider>>,
    middlewares: Vec<Arc<dyn Middleware>>,
    interceptors: Vec<RpcInterceptor>,
    rpc_registrars: Vec<RpcRegistrar>,
    gateway_registrars: Vec<GatewayRegistrar>,
    public: Closer,
    debug: Closer,
    closers: Closer,
    state: StateMachine,
    bound: Option<BoundAddrs>,
    exit_tx: ExitSender,
    exit_rx: Option<mpsc::UnboundedReceiver<&'static str>>,
    shutdown_started: AtomicBool,
}

impl App {
    pub fn new(config: Config) -> Result<Self, LifecycleError> {
        let metrics = Metrics::new(&config.server.metrics_namespace)
            .map_err(|e| StartupError::Registration(format!("metrics registry: {}", e)))?;
        let health =
            HealthRegistry::new().with_check_timeout(config.lifecycle.health_check_timeout);
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();

        Ok(Self {
            config,
            health: Arc::new(health),
            metrics: Arc::new(metrics),
            docs: None,
            middlewares: Vec::new(),
            interceptors: Vec::new(),
            rpc_registrars: Vec::new(),
            gateway_registrars: Vec::new(),
            public: Closer::new("public"),
            debug: Closer::new("debug"),
            closers: Closer::new("resources"),
            state: StateMachine::new(),
            bound: None,
            exit_tx,
            exit_rx: Some(exit_rx),
            shutdown_started: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Health registry served on `/live` and `/ready`.
    pub fn health(&self) -> &Arc<HealthRegistry> {
        &self.health
    }

    /// Metrics registry served on `/metrics`.
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn state(&self) -> LifecycleState {
        self.state.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Visited states with the time each was entered.
    pub fn history(&self) -> Vec<(LifecycleState, Instant)> {
        self.state.history()
    }

    /// Bound addresses, once started.
    pub fn bound_addrs(&self) -> Option<BoundAddrs> {
        self.bound
    }

    /// Register gRPC services; applied at start.
    pub fn register_rpc<F>(&mut self, registrar: F)
    where
        F: FnOnce(&mut RoutesBuilder) + Send + 'static,
    {
        self.rpc_registrars.push(Box::new(registrar));
    }

    /// Register gateway routes; applied once the loopback client is dialed.
    pub fn register_gateway<F>(&mut self, registrar: F)
    where
        F: FnOnce(&mut GatewayRouter) + Send + 'static,
    {
        self.gateway_registrars.push(Box::new(registrar));
    }

    /// Add a gateway middleware, run inside metrics and outside recovery.
    pub fn use_middleware<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middlewares.push(Arc::new(middleware));
    }

    /// Add a gRPC interceptor, run inside metrics and outside recovery.
    /// Interceptors run in registration order; an `Err` rejects the call.
    pub fn use_interceptor<F>(&mut self, interceptor: F)
    where
        F: Fn(tonic::Request<()>) -> Result<tonic::Request<()>, tonic::Status>
            + Send
            + Sync
            + 'static,
    {
        self.interceptors.push(Arc::new(interceptor));
    }

    /// Replace the default Swagger docs provider.
    pub fn set_docs(&mut self, docs: Arc<dyn DocsProvider>) {
        self.docs = Some(docs);
    }

    /// Register a resource to release after every surface has stopped.
    pub fn add_closer<F, Fut, E>(&self, name: impl Into<String>, hook: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display,
    {
        self.closers.add(name, hook);
    }

    /// Bind all listeners, then start RPC, gateway and debug in that order.
    pub async fn start(&mut self) -> Result<BoundAddrs, LifecycleError> {
        if self.state() != LifecycleState::Starting || self.bound.is_some() {
            return Err(LifecycleError::InvalidState("start called more than once"));
        }

        let endpoints = &self.config.server.endpoints;
        let rpc = Arc::new(RpcSurface::bind(endpoints.rpc)?);
        let gateway = Arc::new(HttpSurface::bind("gateway", endpoints.http)?);
        let debug = Arc::new(HttpSurface::bind("debug", endpoints.debug)?);

        let bound = BoundAddrs {
            rpc: rpc.local_addr(),
            http: gateway.local_addr(),
            debug: debug.local_addr(),
        };

        if let Err(e) = self.serve(&rpc, &gateway, &debug, bound).await {
            debug.stop_forced();
            gateway.stop_forced();
            rpc.stop_forced();
            return Err(e.into());
        }

        let lifecycle = &self.config.lifecycle;
        self.public.add_surface(gateway, lifecycle.grace_timeout);
        self.public.add_surface(rpc, lifecycle.grace_timeout);
        self.debug.add_surface(debug, lifecycle.debug_grace_timeout);

        self.bound = Some(bound);
        self.state.advance(LifecycleState::Running);
        Ok(bound)
    }

    async fn serve(
        &mut self,
        rpc: &RpcSurface,
        gateway: &HttpSurface,
        debug: &HttpSurface,
        bound: BoundAddrs,
    ) -> Result<(), StartupError> {
        let endpoints = EndpointSet {
            rpc: bound.rpc,
            http: bound.http,
            debug: bound.debug,
            ..self.config.server.endpoints.clone()
        };

        for registrar in self.rpc_registrars.drain(..) {
            rpc.register(registrar);
        }
        let interceptors: InterceptorChain = self.interceptors.iter().cloned().collect();
        rpc.start(
            Arc::clone(&self.metrics),
            interceptors,
            Some(self.exit_tx.clone()),
        )?;

        let client = LoopbackClient::dial(bound.rpc).await?;
        let mut router = GatewayRouter::new(client);
        for registrar in self.gateway_registrars.drain(..) {
            registrar(&mut router);
        }
        let chain = build_chain(&self.config.middleware, &endpoints, &self.middlewares);
        let pipeline =
            GatewayPipeline::new(HttpMetrics::new(Arc::clone(&self.metrics)), chain, router);
        gateway.start(
            pipeline.into_handler(),
            ServeOptions {
                max_body_size: self.config.server.max_body_size,
                metrics: Arc::clone(&self.metrics),
                exit: Some(self.exit_tx.clone()),
            },
        )?;

        let docs = self.docs.clone().unwrap_or_else(|| {
            Arc::new(SwaggerDocs::new(&self.config.server.docs_dir, &endpoints))
        });
        let routes = DebugRoutes::new(Arc::clone(&self.health), Arc::clone(&self.metrics), docs);
        debug.start(
            debug_handler(Arc::new(routes)),
            ServeOptions {
                max_body_size: DEBUG_MAX_BODY_SIZE,
                metrics: Arc::clone(&self.metrics),
                exit: Some(self.exit_tx.clone()),
            },
        )?;

        Ok(())
    }

    /// Start if needed, wait for SIGINT/SIGTERM, then shut down.
    pub async fn run(&mut self) -> Result<ShutdownReport, LifecycleError> {
        self.run_until(shutdown_signal()).await
    }

    /// Start if needed, wait for `signal` or a surface exiting on its own,
    /// then shut down.
    pub async fn run_until<F>(&mut self, signal: F) -> Result<ShutdownReport, LifecycleError>
    where
        F: Future<Output = ()>,
    {
        if self.state() == LifecycleState::Starting {
            self.start().await?;
        }

        let mut exit_rx = self.exit_rx.take();
        let exited = async {
            match exit_rx.as_mut() {
                Some(rx) => rx.recv().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = signal => {}
            Some(surface) = exited => {
                error!(surface = surface, "surface exited unexpectedly");
            }
        }

        self.shutdown().await
    }

    /// Drain, then stop public surfaces, debug surface and closers in order.
    ///
    /// Failures are logged and returned in the report. A second call
    /// returns [`LifecycleError::AlreadyTerminated`] without running
    /// anything.
    pub async fn shutdown(&self) -> Result<ShutdownReport, LifecycleError> {
        if self.shutdown_started.swap(true, Ordering::SeqCst) {
            return Err(LifecycleError::AlreadyTerminated);
        }

        let started = Instant::now();
        let lifecycle = &self.config.lifecycle;
        info!("shutdown process initiated");

        self.state.advance(LifecycleState::Draining);
        info!(delay = ?lifecycle.drain_delay, "waiting stop of traffic");
        tokio::time::sleep(lifecycle.drain_delay).await;
        info!("shutting down");

        self.state.advance(LifecycleState::StoppingPublic);
        let mut errors = self.public.close_all(None).await;

        self.state.advance(LifecycleState::StoppingDebug);
        errors.extend(self.debug.close_all(None).await);
        errors.extend(self.closers.close_all(Some(lifecycle.grace_timeout)).await);

        self.state.advance(LifecycleState::Terminated);

        let report = ShutdownReport {
            errors,
            elapsed: started.elapsed(),
        };
        if report.is_clean() {
            info!(elapsed = ?report.elapsed, "shutdown complete");
        } else {
            warn!(
                elapsed = ?report.elapsed,
                failures = report.errors.len(),
                "shutdown completed with errors"
            );
        }
        Ok(report)
    }
}
