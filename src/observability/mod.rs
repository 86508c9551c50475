//! Observability subsystem.
//!
//! # Design Decisions
//! - Structured logging through `tracing`, configurable via `RUST_LOG`
//! - One process-wide Prometheus registry; every subsystem registers its
//!   collectors on it at construction
//! - The registry is exposed on a separate internal listener so scrapes
//!   never compete with proxied traffic

pub mod logging;
pub mod metrics;
