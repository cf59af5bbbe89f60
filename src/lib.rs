//! Watchgate — a coordination-aware TCP service.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌────────────────────────────────────────────────┐
//!                    │                  WATCHGATE                      │
//!                    │                                                 │
//!    Client ─────────┼─▶ net/listener ──▶ net/handler ──▶ proto       │
//!    connections     │        │            (factory seam)              │
//!                    │        │                  │                     │
//!                    │        │                  ▼ state snapshots     │
//!                    │        │           coord/observer ◀─────────────┼──── Coordination
//!                    │        │            (session task)              │     ensemble
//!                    │        ▼                  ▲                     │
//!                    │   lifecycle/controller ───┘                     │
//!                    │   (start order, readiness gating,               │
//!                    │    shutdown order, fault propagation)           │
//!                    │                                                 │
//!                    │   config · observability · signals              │
//!                    └────────────────────────────────────────────────┘
//! ```
//!
//! The controller binds the listener first and gates readiness on that bind
//! alone; the coordination observer is best-effort and the service keeps
//! serving when the backend is unreachable. Shutdown releases resources in
//! reverse dependency order with a bounded drain.

pub mod config;
pub mod coord;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod proto;

pub use config::ServiceConfig;
pub use coord::{CoordinationObserver, SessionState, StateHandle};
pub use lifecycle::{LifecycleState, ServiceLifecycleController, StartError, TerminationReason};
pub use net::{ConnectionHandlerFactory, Inbound};
