//! Accepted RPC connections tracked for forced shutdown.
//!
//! tonic drives every connection on its own task, so aborting the serve
//! task leaves them running. Each accepted stream registers a duplicate of
//! its socket here; [`ConnectionSet::shutdown_all`] shuts those down, which
//! ends the HTTP/2 connection and drops its in-flight calls.

use std::collections::HashMap;
use std::io;
use std::net::Shutdown;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use socket2::{SockRef, Socket};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tonic::transport::server::{Connected, TcpConnectInfo};
use tracing::debug;

#[derive(Default)]
struct Registry {
    next_id: u64,
    closed: bool,
    sockets: HashMap<u64, Socket>,
}

/// Live connections of one surface.
#[derive(Clone, Default)]
pub(crate) struct ConnectionSet {
    inner: Arc<Mutex<Registry>>,
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an accepted stream. After [`ConnectionSet::shutdown_all`]
    /// new streams are shut down immediately.
    pub fn track(&self, stream: TcpStream) -> io::Result<TrackedStream> {
        let socket = SockRef::from(&stream).try_clone()?;

        let mut registry = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if registry.closed {
            let _ = socket.shutdown(Shutdown::Both);
        }
        let id = registry.next_id;
        registry.next_id += 1;
        registry.sockets.insert(id, socket);

        Ok(TrackedStream {
            inner: stream,
            id,
            set: self.clone(),
        })
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).sockets.len()
    }

    /// Shut down every live connection in both directions.
    pub fn shutdown_all(&self) -> usize {
        let sockets: Vec<Socket> = {
            let mut registry = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            registry.closed = true;
            registry.sockets.drain().map(|(_, socket)| socket).collect()
        };

        for socket in &sockets {
            if let Err(e) = socket.shutdown(Shutdown::Both) {
                debug!(error = %e, "grpc: connection shutdown failed");
            }
        }
        sockets.len()
    }

    fn release(&self, id: u64) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .sockets
            .remove(&id);
    }
}

/// TCP stream that leaves its [`ConnectionSet`] on drop.
pub(crate) struct TrackedStream {
    inner: TcpStream,
    id: u64,
    set: ConnectionSet,
}

impl Drop for TrackedStream {
    fn drop(&mut self) {
        self.set.release(self.id);
    }
}

impl Connected for TrackedStream {
    type ConnectInfo = TcpConnectInfo;

    fn connect_info(&self) -> Self::ConnectInfo {
        self.inner.connect_info()
    }
}

impl AsyncRead for TrackedStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for TrackedStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }
}
