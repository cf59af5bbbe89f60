//! Termination signalling for the service.

use tokio::sync::watch;

/// Why the service stopped (or is stopping).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// An orderly stop was requested (signal or explicit `stop()`).
    GracefulShutdown,
    /// The listener's accept loop died on an unrecoverable error.
    ListenerFault,
}

/// Coordinator for the service's single termination event.
///
/// Built on a watch channel so the first triggered reason sticks and
/// waiters that subscribe late still observe it.
#[derive(Clone)]
pub struct TerminationSignal {
    tx: watch::Sender<Option<TerminationReason>>,
}

impl TerminationSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Record a termination reason. The first reason wins; later triggers
    /// are ignored.
    pub fn trigger(&self, reason: TerminationReason) {
        self.tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        });
    }

    /// The recorded reason, if termination has been triggered.
    pub fn fired(&self) -> Option<TerminationReason> {
        *self.tx.borrow()
    }

    /// Suspend until termination is triggered. Condition-based, never polls.
    pub async fn wait(&self) -> TerminationReason {
        let mut rx = self.tx.subscribe();
        loop {
            if let Some(reason) = *rx.borrow_and_update() {
                return reason;
            }
            // self holds the sender, so changed() cannot error while we wait
            if rx.changed().await.is_err() {
                return TerminationReason::GracefulShutdown;
            }
        }
    }
}

impl Default for TerminationSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_reason_wins() {
        let signal = TerminationSignal::new();
        signal.trigger(TerminationReason::ListenerFault);
        signal.trigger(TerminationReason::GracefulShutdown);
        assert_eq!(signal.fired(), Some(TerminationReason::ListenerFault));
    }

    #[tokio::test]
    async fn wait_resolves_after_trigger() {
        let signal = TerminationSignal::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.wait().await })
        };

        signal.trigger(TerminationReason::GracefulShutdown);
        let reason = tokio::time::timeout(std::time::Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reason, TerminationReason::GracefulShutdown);
    }

    #[tokio::test]
    async fn wait_resolves_immediately_when_already_fired() {
        let signal = TerminationSignal::new();
        signal.trigger(TerminationReason::GracefulShutdown);
        assert_eq!(signal.wait().await, TerminationReason::GracefulShutdown);
    }
}
