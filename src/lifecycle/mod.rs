//! Process lifecycle coordination.
//!
//! # Design Decisions
//! - One `Shutdown` owner; each long-running task (servers, probe loop)
//!   holds its own `ShutdownListener`
//! - Listeners are handed out before tasks spawn; one created after the
//!   trigger never sees the signal
//! - In-flight requests drain through the HTTP server's graceful shutdown

pub mod shutdown;

pub use shutdown::{Shutdown, ShutdownListener};
