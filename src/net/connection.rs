//! Connection identity and lifetime tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Count active connections for drain decisions and metrics
//! - Release counts via drop guards, panic-safe

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::observability::metrics;

/// Global atomic counter for connection IDs.
/// Relaxed ordering is sufficient: only uniqueness matters.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Counts active connections on a listener.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    active: Arc<AtomicU64>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new active connection. The returned guard decrements the
    /// count when dropped, even if the handler task panics.
    pub fn track(&self) -> ConnectionGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        metrics::connection_opened();
        ConnectionGuard {
            active: Arc::clone(&self.active),
            id: ConnectionId::new(),
        }
    }

    /// Current number of active connections.
    pub fn active_count(&self) -> u64 {
        self.active.load(Ordering::SeqCst)
    }
}

/// Guard tying the active count to a connection's lifetime.
#[derive(Debug)]
pub struct ConnectionGuard {
    active: Arc<AtomicU64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        metrics::connection_closed();
        tracing::trace!(connection_id = %self.id, "connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_ids_are_unique() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn tracker_counts_follow_guard_lifetimes() {
        let tracker = ConnectionTracker::new();
        assert_eq!(tracker.active_count(), 0);

        let g1 = tracker.track();
        let g2 = tracker.track();
        assert_eq!(tracker.active_count(), 2);

        drop(g1);
        assert_eq!(tracker.active_count(), 1);

        drop(g2);
        assert_eq!(tracker.active_count(), 0);
    }
}
