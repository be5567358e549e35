//! Listener plumbing shared by the three surfaces, plus the debug surface.
//!
//! Every surface binds eagerly through [`bind_listener`] so a port conflict
//! is reported before anything starts serving. HTTP surfaces (gateway and
//! debug) run on [`HttpSurface`]: a hyper HTTP/1.1 accept loop whose
//! connections are tracked for graceful shutdown.
//!
//! ```text
//! accept ─► service_fn ─► collect body (limited) ─► HttpHandler ─► Response
//!    │
//!    └─ shutdown signal: stop accepting, wait for watched connections
//! ```

mod docs;
mod internal;

pub use docs::{DocsProvider, SwaggerDocs};
pub use internal::{debug_handler, DebugRoutes};

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::{AbortHandle, JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::core::{Error, HttpResponse, Request, Response};
use crate::lifecycle::StartupError;
use crate::observability::Metrics;

/// Pause after a failed accept (e.g. file descriptor exhaustion).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Listen backlog for every surface.
const LISTEN_BACKLOG: i32 = 1024;

/// Async request handler run by an [`HttpSurface`].
pub type HttpHandler = Arc<dyn Fn(Request) -> BoxFuture<'static, Response> + Send + Sync>;

/// Channel on which surfaces report an unexpected exit of their serve loop.
pub type ExitSender = mpsc::UnboundedSender<&'static str>;

/// A network surface the lifecycle can stop.
#[async_trait]
pub trait Surface: Send + Sync {
    /// Short name used in logs and shutdown reports.
    fn name(&self) -> &'static str;

    /// Stop accepting and wait for in-flight requests to finish.
    async fn stop_graceful(&self) -> Result<(), String>;

    /// Abort serving immediately.
    fn stop_forced(&self);
}

/// Bind a non-blocking TCP listener with `SO_REUSEADDR`.
pub fn bind_listener(addr: SocketAddr) -> std::io::Result<std::net::TcpListener> {
    let domain = if addr.is_ipv6() {
        Domain::IPV6
    } else {
        Domain::IPV4
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nodelay(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;

    Ok(socket.into())
}

/// Bind for `surface`, mapping failures to a fatal [`StartupError`].
pub(crate) fn bind_surface(
    surface: &'static str,
    addr: SocketAddr,
) -> Result<(std::net::TcpListener, SocketAddr), StartupError> {
    let bind_err = |source| StartupError::Bind {
        surface,
        addr,
        source,
    };
    let listener = bind_listener(addr).map_err(bind_err)?;
    let local_addr = listener.local_addr().map_err(bind_err)?;
    Ok((listener, local_addr))
}

/// Serve options for an [`HttpSurface`].
#[derive(Clone)]
pub struct ServeOptions {
    /// Request body limit in bytes.
    pub max_body_size: usize,
    /// Registry for the active-connections gauge.
    pub metrics: Arc<Metrics>,
    /// Notified if the serve loop ends without a shutdown request.
    pub exit: Option<ExitSender>,
}

/// HTTP/1.1 surface with graceful and forced stop.
pub struct HttpSurface {
    name: &'static str,
    local_addr: SocketAddr,
    listener: Mutex<Option<std::net::TcpListener>>,
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
    abort: Mutex<Option<AbortHandle>>,
}

impl HttpSurface {
    /// Bind the listener; serving starts with [`HttpSurface::start`].
    pub fn bind(name: &'static str, addr: SocketAddr) -> Result<Self, StartupError> {
        let (listener, local_addr) = bind_surface(name, addr)?;
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            name,
            local_addr,
            listener: Mutex::new(Some(listener)),
            shutdown_tx,
            task: Mutex::new(None),
            abort: Mutex::new(None),
        })
    }

    /// Address actually bound (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Spawn the accept loop. Calling it twice is a registration error.
    pub fn start(&self, handler: HttpHandler, options: ServeOptions) -> Result<(), StartupError> {
        let std_listener = self
            .listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or_else(|| {
                StartupError::Registration(format!("{} surface already started", self.name))
            })?;

        let listener = TcpListener::from_std(std_listener).map_err(|source| StartupError::Bind {
            surface: self.name,
            addr: self.local_addr,
            source,
        })?;

        let name = self.name;
        let shutdown_rx = self.shutdown_tx.subscribe();
        let exit = options.exit.clone();
        let stopping = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            serve_http(name, listener, handler, options, shutdown_rx).await;
            if !*stopping.borrow() {
                if let Some(exit) = exit {
                    let _ = exit.send(name);
                }
            }
        });

        info!(
            surface = name,
            addr = %self.local_addr,
            "{} server listening on {}",
            name,
            self.local_addr
        );

        *self.abort.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle.abort_handle());
        *self.task.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        Ok(())
    }
}

#[async_trait]
impl Surface for HttpSurface {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn stop_graceful(&self) -> Result<(), String> {
        let _ = self.shutdown_tx.send(true);

        let task = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        match task {
            Some(task) => match task.await {
                Ok(()) => Ok(()),
                Err(e) if e.is_cancelled() => Ok(()),
                Err(e) => Err(format!("serve task failed: {}", e)),
            },
            // Never started: dropping the listener is enough
            None => {
                self.listener.lock().unwrap_or_else(|e| e.into_inner()).take();
                Ok(())
            }
        }
    }

    fn stop_forced(&self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(abort) = self.abort.lock().unwrap_or_else(|e| e.into_inner()).take() {
            abort.abort();
        }
        self.listener.lock().unwrap_or_else(|e| e.into_inner()).take();
    }
}

async fn serve_http(
    name: &'static str,
    listener: TcpListener,
    handler: HttpHandler,
    options: ServeOptions,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let graceful = GracefulShutdown::new();
    let mut connections = JoinSet::new();
    let max_body_size = options.max_body_size;

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, remote_addr) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(surface = name, error = %e, "accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                };
                let _ = stream.set_nodelay(true);

                let handler = Arc::clone(&handler);
                let service = service_fn(move |req| {
                    handle(Arc::clone(&handler), req, remote_addr, max_body_size)
                });
                let conn = graceful.watch(
                    http1::Builder::new().serve_connection(TokioIo::new(stream), service),
                );
                let guard = ConnectionGuard::new(Arc::clone(&options.metrics), name);

                connections.spawn(async move {
                    let _guard = guard;
                    if let Err(e) = conn.await {
                        debug!(surface = name, error = %e, "connection error");
                    }
                });
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            _ = shutdown_rx.changed() => break,
        }
    }

    drop(listener);
    debug!(surface = name, in_flight = connections.len(), "draining connections");
    graceful.shutdown().await;
    while connections.join_next().await.is_some() {}
    info!(surface = name, "{} server stopped", name);
}

async fn handle(
    handler: HttpHandler,
    req: http::Request<Incoming>,
    remote_addr: SocketAddr,
    max_body_size: usize,
) -> Result<HttpResponse, Infallible> {
    let (parts, body) = req.into_parts();

    let body = match Limited::new(body, max_body_size).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            let err = if e.downcast_ref::<LengthLimitError>().is_some() {
                Error::BodyTooLarge {
                    limit: max_body_size,
                }
            } else {
                Error::Body(e.to_string())
            };
            return Ok(crate::gateway::error_response(&err).into());
        }
    };

    let req = Request::from_parts(parts, body).with_remote_addr(remote_addr);
    Ok(handler(req).await.into())
}

/// Keeps the active-connections gauge in sync with a connection task.
struct ConnectionGuard {
    metrics: Arc<Metrics>,
    surface: &'static str,
}

impl ConnectionGuard {
    fn new(metrics: Arc<Metrics>, surface: &'static str) -> Self {
        metrics.inc_connections(surface);
        Self { metrics, surface }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.metrics.dec_connections(self.surface);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpStream;

    fn localhost() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[test]
    fn test_bind_listener_ephemeral() {
        let listener = bind_listener(localhost()).unwrap();
        let addr = listener.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        assert!(TcpStream::connect(addr).is_ok());
    }

    #[test]
    fn test_bind_conflict_is_startup_error() {
        let (_held, addr) = bind_surface("debug", localhost()).unwrap();
        let err = bind_surface("debug", addr).unwrap_err();
        assert!(matches!(err, StartupError::Bind { surface: "debug", .. }));
    }

    fn echo_handler() -> HttpHandler {
        Arc::new(|req: Request| {
            Box::pin(async move { Response::ok(format!("{} {}", req.method(), req.path())) })
        })
    }

    fn options(metrics: &Arc<Metrics>) -> ServeOptions {
        ServeOptions {
            max_body_size: 16,
            metrics: Arc::clone(metrics),
            exit: None,
        }
    }

    #[tokio::test]
    async fn test_http_surface_serves_and_stops() {
        let metrics = Arc::new(Metrics::new("surface_test").unwrap());
        let surface = HttpSurface::bind("debug", localhost()).unwrap();
        surface.start(echo_handler(), options(&metrics)).unwrap();

        let url = format!("http://{}/live", surface.local_addr());
        let body = reqwest::get(&url).await.unwrap().text().await.unwrap();
        assert_eq!(body, "GET /live");

        assert!(surface.stop_graceful().await.is_ok());
        assert!(reqwest::get(&url).await.is_err());
    }

    #[tokio::test]
    async fn test_http_surface_rejects_large_body() {
        let metrics = Arc::new(Metrics::new("surface_body").unwrap());
        let surface = HttpSurface::bind("gateway", localhost()).unwrap();
        surface.start(echo_handler(), options(&metrics)).unwrap();

        let res = reqwest::Client::new()
            .post(format!("http://{}/upload", surface.local_addr()))
            .body(vec![b'x'; 64])
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 413);

        surface.stop_forced();
    }

    #[tokio::test]
    async fn test_http_surface_start_twice() {
        let metrics = Arc::new(Metrics::new("surface_twice").unwrap());
        let surface = HttpSurface::bind("debug", localhost()).unwrap();
        surface.start(echo_handler(), options(&metrics)).unwrap();
        let err = surface.start(echo_handler(), options(&metrics)).unwrap_err();
        assert!(matches!(err, StartupError::Registration(_)));
        surface.stop_forced();
    }

    #[tokio::test]
    async fn test_stop_unstarted_surface() {
        let surface = HttpSurface::bind("debug", localhost()).unwrap();
        let addr = surface.local_addr();
        assert!(surface.stop_graceful().await.is_ok());
        assert!(bind_listener(addr).is_ok());
    }
}
