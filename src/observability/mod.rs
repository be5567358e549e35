//! Observability module: request metrics and status classification.
//!
//! # Usage
//!
//! ```rust,ignore
//! use gantry::observability::{http_bucket, Metrics, PROTOCOL_HTTP};
//!
//! let metrics = Metrics::new("orders")?;
//! metrics.observe("HTTP GET: /v1/orders/{id}", PROTOCOL_HTTP, http_bucket(200), elapsed);
//! println!("{}", metrics.export()?);
//! ```

pub mod metrics;
pub mod status;

pub use metrics::{normalize_path, Metrics, PROTOCOL_GRPC, PROTOCOL_HTTP};
pub use status::{grpc_bucket, grpc_code_bucket, http_bucket, StatusBucket};
