//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → routes.rs (fixed Prometheus API route set + operator passthroughs)
//!     → mux.rs (strict table: exact or subtree match, instrumented)
//!     → pipeline entry, passthrough forwarder, or 404
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Registration rejects any pair of patterns sharing a `/`-prefix, so a
//!   path can never match two handlers
//! - No regex anywhere; passthrough paths must equal their parsed
//!   canonical form

pub mod mux;
pub mod routes;

pub use routes::Routes;
