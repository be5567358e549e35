//! Ordered shutdown hooks.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tracing::{error, info, warn};

use super::ShutdownError;
use crate::health::panic_message;
use crate::server::Surface;

type Hook = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), ShutdownError>> + Send>;

/// Hooks run sequentially in registration order, each at most once.
pub struct Closer {
    name: &'static str,
    hooks: Mutex<Vec<(String, Hook)>>,
}

impl Closer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            hooks: Mutex::new(Vec::new()),
        }
    }

    /// Register a hook; an `Err` is reported as [`ShutdownError::Failed`].
    pub fn add<F, Fut, E>(&self, name: impl Into<String>, hook: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display,
    {
        let name = name.into();
        let hook_name = name.clone();
        self.push(
            name,
            Box::new(move || {
                Box::pin(async move {
                    hook().await.map_err(|e| ShutdownError::Failed {
                        hook: hook_name,
                        reason: e.to_string(),
                    })
                })
            }),
        );
    }

    /// Register a surface stop: graceful within `grace`, forced after.
    pub fn add_surface(&self, surface: Arc<dyn Surface>, grace: Duration) {
        let name = surface.name().to_string();
        self.push(
            name,
            Box::new(move || Box::pin(async move { stop_surface(surface.as_ref(), grace).await })),
        );
    }

    fn push(&self, name: String, hook: Hook) {
        self.hooks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((name, hook));
    }

    pub fn len(&self) -> usize {
        self.hooks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every pending hook and return one error per failed hook.
    ///
    /// With a `deadline`, a hook still running after it is abandoned and
    /// reported as a timeout.
    pub async fn close_all(&self, deadline: Option<Duration>) -> Vec<ShutdownError> {
        let hooks = std::mem::take(&mut *self.hooks.lock().unwrap_or_else(|e| e.into_inner()));
        let mut errors = Vec::new();

        for (name, hook) in hooks {
            let fut = AssertUnwindSafe(hook()).catch_unwind();
            let outcome = match deadline {
                Some(after) => match tokio::time::timeout(after, fut).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        errors.push(ShutdownError::Timeout { hook: name, after });
                        continue;
                    }
                },
                None => fut.await,
            };

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => errors.push(err),
                Err(panic) => errors.push(ShutdownError::Failed {
                    hook: name,
                    reason: format!("panicked: {}", panic_message(&panic)),
                }),
            }
        }

        for err in &errors {
            error!(closer = self.name, error = %err, "error returned from closer");
        }
        errors
    }
}

/// Stop `surface` gracefully, forcing it if `grace` elapses first.
pub async fn stop_surface(surface: &dyn Surface, grace: Duration) -> Result<(), ShutdownError> {
    let name = surface.name();

    tokio::select! {
        result = surface.stop_graceful() => match result {
            Ok(()) => {
                info!(surface = name, "{}: gracefully stopped", name);
                Ok(())
            }
            Err(reason) => Err(ShutdownError::Failed {
                hook: name.to_string(),
                reason,
            }),
        },
        _ = tokio::time::sleep(grace) => {
            surface.stop_forced();
            warn!(surface = name, after = ?grace, "{}: force stopped", name);
            Err(ShutdownError::Timeout {
                hook: name.to_string(),
                after: grace,
            })
        }
    }
}
