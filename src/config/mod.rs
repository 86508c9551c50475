//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → shared by value with all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Health queries are parsed as PromQL at startup so a typo fails the
//!   process instead of silently disabling backpressure

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::MiddlewareConfig;
pub use schema::ProxyConfig;
pub use validation::ValidationError;
