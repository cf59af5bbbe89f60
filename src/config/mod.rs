//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → CLI flag overrides (main.rs)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → handed to the lifecycle controller at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once accepted; there is no reload path
//! - All fields have defaults so a minimal config (port + endpoint) works
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::CoordinationConfig;
pub use schema::ListenerConfig;
pub use schema::ObservabilityConfig;
pub use schema::ServiceConfig;
