//! HTTP subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request
//!     → server.rs (axum server, Trace/Timeout layers)
//!     → routing::Routes (strict dispatch)
//!     → pipeline entry or passthrough
//!     → forward.rs (single-host hop to upstream)
//!     → response streamed back to client
//! ```
//!
//! # Design Decisions
//! - One shared upstream client; per-request state lives in the request
//! - Transport failures map to 502, never to a hung connection
//! - Error payloads use the Prometheus-style JSON envelope

pub mod error;
pub mod forward;
pub mod server;

pub use forward::Forwarder;
pub use server::HttpServer;
