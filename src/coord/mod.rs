//! Coordination backend subsystem.
//!
//! # Data Flow
//! ```text
//! "host:port[,host:port...]" connection string
//!     → endpoint.rs (parse & validate)
//!     → observer.rs (session task: connect, hold, reconnect)
//!     → SessionState published via watch channel
//!     → StateHandle snapshots read by every connection handler
//! ```
//!
//! # Design Decisions
//! - The observer is best-effort: its failures never take down the listener
//! - Reconnection policy (backoff.rs) is internal; callers only see states
//! - Single writer, many readers: no handler-side locking required

pub mod backoff;
pub mod endpoint;
pub mod observer;

pub use endpoint::CoordinationEndpoint;
pub use observer::{CoordinationObserver, SessionState, StateHandle};
