//! Integration tests for gantry
//!
//! Each test starts a real `App` on ephemeral ports with a hand-written
//! tonic echo service and drives it over HTTP (reqwest) and gRPC (tonic).
//!
//! Run with: cargo test --test integration

mod helpers;

mod gateway;
mod health;
mod lifecycle;
mod metrics;
