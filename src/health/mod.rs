//! Health check aggregation for liveness and readiness probes.
//!
//! Checks are registered by name in two groups. A probe runs every check of
//! its group as a separate task and waits for all of them:
//! - **Liveness**: is the process itself healthy? (restart if failed)
//! - **Readiness**: can the service take traffic? Includes all liveness checks.
//!
//! ```rust,ignore
//! let health = HealthRegistry::new();
//! health.add_readiness_check("db", move || {
//!     let pool = pool.clone();
//!     async move { pool.ping().await }
//! });
//! let report = health.probe_readiness().await;
//! ```

mod checker;
mod status;

pub use checker::{Check, HealthRegistry};
pub(crate) use checker::panic_message;
pub use status::{CheckResult, HealthStatus, ProbeReport, ProbeType, CHECK_SUCCESS};
