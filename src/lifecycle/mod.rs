//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (controller.rs):
//!     Validated config → bind listener → start observer → Running
//!     Bind failure → Failed (observer never started)
//!
//! Shutdown (controller.rs + shutdown.rs):
//!     Signal or fault → stop accepting → drain connections → close session
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → graceful shutdown trigger
//! ```
//!
//! # Design Decisions
//! - Ordered startup: listener before observer, readiness gated on bind only
//! - Ordered shutdown: reverse dependency order, bounded by the grace period
//! - One termination event per process; the first reason wins

pub mod controller;
pub mod shutdown;
pub mod signals;

pub use controller::{LifecycleState, ServiceLifecycleController, StartError};
pub use shutdown::{TerminationReason, TerminationSignal};
