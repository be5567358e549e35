//! Lifecycle error types.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

/// Fatal errors raised while bringing the surfaces up.
#[derive(Debug)]
pub enum StartupError {
    /// A listener could not be bound.
    Bind {
        surface: &'static str,
        addr: SocketAddr,
        source: io::Error,
    },

    /// The gateway could not dial the RPC listener.
    Dial {
        addr: SocketAddr,
        source: tonic::transport::Error,
    },

    /// Service or route registration failed.
    Registration(String),
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartupError::Bind {
                surface,
                addr,
                source,
            } => write!(f, "failed to bind {} listener on {}: {}", surface, addr, source),
            StartupError::Dial { addr, source } => {
                write!(f, "failed to dial internal grpc conn {}: {}", addr, source)
            }
            StartupError::Registration(msg) => write!(f, "registration failed: {}", msg),
        }
    }
}

impl std::error::Error for StartupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StartupError::Bind { source, .. } => Some(source),
            StartupError::Dial { source, .. } => Some(source),
            StartupError::Registration(_) => None,
        }
    }
}

/// Outcome of a shutdown hook that did not finish cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownError {
    /// The hook missed its deadline.
    Timeout { hook: String, after: Duration },

    /// The hook returned an error or panicked.
    Failed { hook: String, reason: String },
}

impl ShutdownError {
    /// Name of the hook that failed.
    pub fn hook(&self) -> &str {
        match self {
            ShutdownError::Timeout { hook, .. } | ShutdownError::Failed { hook, .. } => hook,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ShutdownError::Timeout { .. })
    }
}

impl fmt::Display for ShutdownError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownError::Timeout { hook, after } => {
                write!(f, "{}: shutdown timed out after {:?}", hook, after)
            }
            ShutdownError::Failed { hook, reason } => write!(f, "{}: {}", hook, reason),
        }
    }
}

impl std::error::Error for ShutdownError {}

/// Errors returned by [`App`](super::App) operations.
#[derive(Debug)]
pub enum LifecycleError {
    /// Shutdown was already performed.
    AlreadyTerminated,

    /// Startup failed; the process should exit.
    Startup(StartupError),

    /// The operation is not valid in the current state.
    InvalidState(&'static str),
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleError::AlreadyTerminated => write!(f, "application already terminated"),
            LifecycleError::Startup(err) => write!(f, "startup failed: {}", err),
            LifecycleError::InvalidState(msg) => write!(f, "invalid lifecycle state: {}", msg),
        }
    }
}

impl std::error::Error for LifecycleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LifecycleError::Startup(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StartupError> for LifecycleError {
    fn from(err: StartupError) -> Self {
        LifecycleError::Startup(err)
    }
}
