//! gRPC surface built on the tonic transport server.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_stream::wrappers::TcpListenerStream;
use tokio_stream::StreamExt;
use tonic::service::RoutesBuilder;
use tonic::transport::Server;
use tracing::{error, info, warn};

use super::connection::ConnectionSet;
use crate::lifecycle::StartupError;
use crate::middleware::{GrpcMetricsLayer, GrpcRecoveryLayer, InterceptorChain};
use crate::observability::Metrics;
use crate::server::{bind_surface, ExitSender, Surface};

/// Deferred service registration.
pub type RpcRegistrar = Box<dyn FnOnce(&mut RoutesBuilder) + Send>;

type ServeResult = Result<(), tonic::transport::Error>;

/// RPC listener bound eagerly and served on demand.
pub struct RpcSurface {
    local_addr: SocketAddr,
    listener: Mutex<Option<std::net::TcpListener>>,
    routes: Mutex<RoutesBuilder>,
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<ServeResult>>>,
    abort: Mutex<Option<AbortHandle>>,
    connections: ConnectionSet,
}

impl RpcSurface {
    pub const NAME: &'static str = "grpc";

    /// Bind the listener. Failure is fatal for the process.
    pub fn bind(addr: SocketAddr) -> Result<Self, StartupError> {
        let (listener, local_addr) = bind_surface(Self::NAME, addr)?;
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            local_addr,
            listener: Mutex::new(Some(listener)),
            routes: Mutex::new(RoutesBuilder::default()),
            shutdown_tx,
            task: Mutex::new(None),
            abort: Mutex::new(None),
            connections: ConnectionSet::new(),
        })
    }

    /// Address actually bound; the gateway dials it.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Add services. Only effective before [`RpcSurface::start`].
    pub fn register<F>(&self, registrar: F)
    where
        F: FnOnce(&mut RoutesBuilder),
    {
        let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
        registrar(&mut routes);
    }

    /// Spawn the server with metrics outermost, then the user interceptors,
    /// and recovery innermost.
    pub fn start(
        &self,
        metrics: Arc<Metrics>,
        interceptors: InterceptorChain,
        exit: Option<ExitSender>,
    ) -> Result<(), StartupError> {
        let std_listener = self
            .listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or_else(|| StartupError::Registration("grpc surface already started".into()))?;

        let listener =
            TcpListener::from_std(std_listener).map_err(|source| StartupError::Bind {
                surface: Self::NAME,
                addr: self.local_addr,
                source,
            })?;

        let routes = std::mem::take(&mut *self.routes.lock().unwrap_or_else(|e| e.into_inner()));
        let router = Server::builder()
            .layer(GrpcMetricsLayer::new(metrics))
            .layer(tonic::service::interceptor(interceptors))
            .layer(GrpcRecoveryLayer)
            .add_routes(routes.routes());

        let connections = self.connections.clone();
        let incoming = TcpListenerStream::new(listener)
            .map(move |accepted| accepted.and_then(|stream| connections.track(stream)));

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let stopping = self.shutdown_tx.subscribe();
        let signal = async move {
            let _ = shutdown_rx.wait_for(|stop| *stop).await;
        };

        let handle = tokio::spawn(async move {
            let result = router.serve_with_incoming_shutdown(incoming, signal).await;
            if let Err(e) = &result {
                error!(
                    surface = Self::NAME,
                    error = %e,
                    "grpc: error occurred while running server"
                );
            }
            if !*stopping.borrow() {
                if let Some(exit) = exit {
                    let _ = exit.send(Self::NAME);
                }
            }
            result
        });

        info!(
            surface = Self::NAME,
            addr = %self.local_addr,
            "grpc server listening on {}",
            self.local_addr
        );

        *self.abort.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle.abort_handle());
        *self.task.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        Ok(())
    }
}

#[async_trait]
impl Surface for RpcSurface {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn stop_graceful(&self) -> Result<(), String> {
        let _ = self.shutdown_tx.send(true);

        let task = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        let Some(task) = task else {
            self.listener.lock().unwrap_or_else(|e| e.into_inner()).take();
            return Ok(());
        };

        match task.await {
            Ok(Ok(())) => {
                info!(surface = Self::NAME, "grpc: gracefully stopped");
                Ok(())
            }
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => Err(format!("serve task failed: {}", e)),
        }
    }

    /// Abort the accept loop and shut down every open connection, which
    /// drops the calls still running on them.
    fn stop_forced(&self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(abort) = self.abort.lock().unwrap_or_else(|e| e.into_inner()).take() {
            abort.abort();
        }
        self.listener.lock().unwrap_or_else(|e| e.into_inner()).take();

        let dropped = self.connections.shutdown_all();
        if dropped > 0 {
            warn!(surface = Self::NAME, connections = dropped, "grpc: connections dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn localhost() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[test]
    fn test_bind_resolves_port() {
        let surface = RpcSurface::bind(localhost()).unwrap();
        assert_ne!(surface.local_addr().port(), 0);
        assert_eq!(surface.name(), "grpc");
    }

    #[test]
    fn test_bind_conflict() {
        let first = RpcSurface::bind(localhost()).unwrap();
        let err = RpcSurface::bind(first.local_addr()).err().unwrap();
        assert!(matches!(err, StartupError::Bind { surface: "grpc", .. }));
    }

    #[tokio::test]
    async fn test_start_and_graceful_stop() {
        let metrics = Arc::new(Metrics::new("rpc_test").unwrap());
        let surface = RpcSurface::bind(localhost()).unwrap();
        surface.start(metrics, InterceptorChain::default(), None).unwrap();

        let addr = surface.local_addr();
        assert!(tokio::net::TcpStream::connect(addr).await.is_ok());

        assert!(surface.stop_graceful().await.is_ok());
        // Second stop is a no-op
        assert!(surface.stop_graceful().await.is_ok());
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let metrics = Arc::new(Metrics::new("rpc_twice").unwrap());
        let surface = RpcSurface::bind(localhost()).unwrap();
        surface
            .start(Arc::clone(&metrics), InterceptorChain::default(), None)
            .unwrap();
        assert!(matches!(
            surface.start(metrics, InterceptorChain::default(), None),
            Err(StartupError::Registration(_))
        ));
        surface.stop_forced();
    }

    #[tokio::test]
    async fn test_forced_stop_cuts_open_connections() {
        use tokio::io::AsyncReadExt;

        let metrics = Arc::new(Metrics::new("rpc_forced").unwrap());
        let surface = RpcSurface::bind(localhost()).unwrap();
        surface.start(metrics, InterceptorChain::default(), None).unwrap();

        let mut client = tokio::net::TcpStream::connect(surface.local_addr()).await.unwrap();
        for _ in 0..100 {
            if surface.connections.len() == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(surface.connections.len(), 1);

        surface.stop_forced();

        // Drain whatever the server sent before the cut; the stream must end
        let mut buf = [0u8; 256];
        let closed = tokio::time::timeout(std::time::Duration::from_secs(2), async {
            loop {
                match client.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => continue,
                }
            }
        })
        .await;
        assert!(closed.is_ok(), "connection should be closed by the forced stop");
    }
}
