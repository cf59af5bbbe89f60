//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (id + lifetime tracking)
//!     → handler.rs (ConnectionHandlerFactory builds the per-connection task)
//!
//! On close:
//!     stop accepting → release socket → signal drain → grace period → abort
//! ```
//!
//! # Design Decisions
//! - Semaphore-bounded accepting prevents resource exhaustion
//! - Each connection runs on its own task; its failures stay its own
//! - Only the ListenerHandle owner can release the socket (close consumes)

pub mod connection;
pub mod handler;
pub mod listener;

pub use handler::{ConnectionHandlerFactory, Inbound};
pub use listener::{bind_and_serve, BindError, ListenerHandle};
