//! Health check registry and concurrent probe executor.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{CheckResult, ProbeReport, ProbeType, CHECK_SUCCESS};

/// Type-erased check function.
pub type Check = Arc<dyn Fn() -> BoxFuture<'static, Result<(), String>> + Send + Sync>;

/// Registry of named liveness and readiness checks.
///
/// Registration takes the write lock, probing only holds the read lock long
/// enough to snapshot the checks, so registering mid-probe is safe and does
/// not affect the probe already running.
pub struct HealthRegistry {
    liveness: RwLock<HashMap<String, Check>>,
    readiness: RwLock<HashMap<String, Check>>,
    check_timeout: Option<Duration>,
}

impl HealthRegistry {
    /// Create an empty registry without per-check timeout.
    pub fn new() -> Self {
        Self {
            liveness: RwLock::new(HashMap::new()),
            readiness: RwLock::new(HashMap::new()),
            check_timeout: None,
        }
    }

    /// Bound each check invocation. `None` keeps probes un-timeboxed.
    pub fn with_check_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.check_timeout = timeout;
        self
    }

    /// Register a liveness check. Re-registering a name replaces the old check.
    ///
    /// Every liveness check is also evaluated by readiness probes.
    pub fn add_liveness_check<F, Fut, E>(&self, name: impl Into<String>, check: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display,
    {
        Self::insert(&self.liveness, name.into(), erase(check));
    }

    /// Register a readiness check. Re-registering a name replaces the old check.
    pub fn add_readiness_check<F, Fut, E>(&self, name: impl Into<String>, check: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display,
    {
        Self::insert(&self.readiness, name.into(), erase(check));
    }

    /// Number of registered checks per group.
    pub fn len(&self, probe: ProbeType) -> usize {
        match probe {
            ProbeType::Liveness => read(&self.liveness).len(),
            ProbeType::Readiness => read(&self.readiness).len() + read(&self.liveness).len(),
        }
    }

    /// Returns true if no checks are registered.
    pub fn is_empty(&self) -> bool {
        self.len(ProbeType::Readiness) == 0
    }

    /// Run liveness checks.
    pub async fn probe_liveness(&self) -> ProbeReport {
        self.probe(ProbeType::Liveness).await
    }

    /// Run readiness and liveness checks.
    pub async fn probe_readiness(&self) -> ProbeReport {
        self.probe(ProbeType::Readiness).await
    }

    /// Run one probe: one task per check, wait for exactly as many results.
    pub async fn probe(&self, probe: ProbeType) -> ProbeReport {
        let checks = self.snapshot(probe);
        let expected = checks.len();
        if expected == 0 {
            return ProbeReport::from_results(Vec::new());
        }

        let (tx, mut rx) = mpsc::channel::<CheckResult>(expected);
        let mut pending: Vec<String> = Vec::with_capacity(expected);

        for (name, check) in checks {
            pending.push(name.clone());
            let tx = tx.clone();
            let timeout = self.check_timeout;
            tokio::spawn(async move {
                let outcome = run_check(&check, timeout).await;
                let _ = tx.send(CheckResult { name, outcome }).await;
            });
        }
        drop(tx);

        let mut results = Vec::with_capacity(expected);
        while results.len() < expected {
            match rx.recv().await {
                Some(result) => results.push(result),
                // Only reachable if a check task was aborted (runtime shutdown)
                None => break,
            }
        }

        if results.len() < expected {
            for name in pending {
                if !results.iter().any(|r| r.name == name) {
                    results.push(CheckResult::fail(name, "check aborted"));
                }
            }
        }

        let report = ProbeReport::from_results(results);
        debug!(probe = %probe, status = ?report.status, checks = expected, "Health probe finished");
        report
    }

    fn snapshot(&self, probe: ProbeType) -> Vec<(String, Check)> {
        let clone_group = |group: &RwLock<HashMap<String, Check>>| {
            read(group)
                .iter()
                .map(|(name, check)| (name.clone(), Arc::clone(check)))
                .collect::<Vec<_>>()
        };

        match probe {
            ProbeType::Liveness => clone_group(&self.liveness),
            ProbeType::Readiness => {
                let mut checks = clone_group(&self.readiness);
                checks.extend(clone_group(&self.liveness));
                checks
            }
        }
    }

    fn insert(group: &RwLock<HashMap<String, Check>>, name: String, check: Check) {
        let mut guard = group.write().unwrap_or_else(|e| e.into_inner());
        if guard.insert(name.clone(), check).is_some() {
            debug!(check = %name, "Health check replaced");
        }
    }
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn read(
    group: &RwLock<HashMap<String, Check>>,
) -> std::sync::RwLockReadGuard<'_, HashMap<String, Check>> {
    group.read().unwrap_or_else(|e| e.into_inner())
}

fn erase<F, Fut, E>(check: F) -> Check
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: fmt::Display,
{
    Arc::new(move || {
        let fut = check();
        async move { fut.await.map_err(|e| e.to_string()) }.boxed()
    })
}

/// Invoke a check, turning errors, panics and timeouts into an outcome string.
async fn run_check(check: &Check, timeout: Option<Duration>) -> String {
    // The synchronous part of the check may panic before a future exists
    let fut = match std::panic::catch_unwind(AssertUnwindSafe(|| check())) {
        Ok(fut) => fut,
        Err(panic) => return panic_outcome(panic),
    };

    let guarded = AssertUnwindSafe(fut).catch_unwind();
    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, guarded).await {
            Ok(result) => result,
            Err(_) => return format!("check timed out after {:?}", limit),
        },
        None => guarded.await,
    };

    match result {
        Ok(Ok(())) => CHECK_SUCCESS.to_string(),
        Ok(Err(message)) => message,
        Err(panic) => panic_outcome(panic),
    }
}

fn panic_outcome(panic: Box<dyn std::any::Any + Send>) -> String {
    let message = panic_message(&panic);
    warn!(panic = %message, "Health check panicked");
    format!("checker panic recovered: {}", message)
}

/// Extract a printable message from a panic payload.
pub(crate) fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
