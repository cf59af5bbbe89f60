//! Coordination backend session observer.
//!
//! # Responsibilities
//! - Maintain a best-effort session to the coordination ensemble
//! - Reconnect with backoff when the session is lost
//! - Publish the session state to any number of concurrent readers
//!
//! # Session States
//! ```text
//! NotStarted → Connecting → Connected ⇄ Disconnected
//!                  │             │           │
//!                  └─────────────┴───────────┴──→ Closed (stop() only, terminal)
//! ```
//!
//! # Design Decisions
//! - State is published through a watch channel: the session task is the
//!   sole writer, readers take lock-free snapshots and never block
//! - Connection failures are never returned to callers; they only surface
//!   as state transitions
//! - The listener must keep serving whatever this component's state is

use std::sync::Mutex;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::CoordinationConfig;
use crate::coord::backoff::reconnect_delay;
use crate::coord::endpoint::CoordinationEndpoint;
use crate::observability::metrics;

/// State of the coordination session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// `start()` has not been called.
    NotStarted,
    /// A connection attempt is in flight.
    Connecting,
    /// A live session to the ensemble exists.
    Connected,
    /// The session was lost; reconnection will be attempted.
    Disconnected,
    /// `stop()` was called. Terminal.
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::NotStarted => "not-started",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Disconnected => "disconnected",
            SessionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Read-only view of the session state, cheap to clone into every
/// connection handler.
#[derive(Debug, Clone)]
pub struct StateHandle {
    rx: watch::Receiver<SessionState>,
}

impl StateHandle {
    /// Non-blocking snapshot of the current state.
    pub fn current(&self) -> SessionState {
        *self.rx.borrow()
    }

    /// Wait for the next state change and return the new state.
    ///
    /// If the observer has been dropped this resolves immediately with the
    /// last published state.
    pub async fn changed(&mut self) -> SessionState {
        let _ = self.rx.changed().await;
        *self.rx.borrow_and_update()
    }
}

/// Observes a distributed-coordination backend over a long-lived session.
pub struct CoordinationObserver {
    state_tx: watch::Sender<SessionState>,
    stop_tx: watch::Sender<bool>,
    session: Mutex<Option<JoinHandle<()>>>,
}

impl CoordinationObserver {
    /// Create an observer in the `NotStarted` state. Nothing is spawned.
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(SessionState::NotStarted);
        let (stop_tx, _) = watch::channel(false);
        Self {
            state_tx,
            stop_tx,
            session: Mutex::new(None),
        }
    }

    /// A handle for reading and awaiting session state.
    pub fn subscribe(&self) -> StateHandle {
        StateHandle {
            rx: self.state_tx.subscribe(),
        }
    }

    /// Non-blocking snapshot of the current session state.
    pub fn current_state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    /// Begin connecting to the ensemble. Non-blocking: the session task is
    /// spawned and all outcomes surface through the state machine.
    pub fn start(&self, endpoint: CoordinationEndpoint, config: &CoordinationConfig) {
        let mut session = self.session.lock().expect("observer session lock poisoned");

        if self.current_state() == SessionState::Closed {
            tracing::warn!("ignoring start() on a closed observer");
            return;
        }
        if session.is_some() {
            tracing::warn!("ignoring start() on an already-started observer");
            return;
        }

        let policy = SessionPolicy {
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            backoff_base_ms: config.backoff_base_ms,
            backoff_max_ms: config.backoff_max_ms,
        };

        tracing::info!(endpoint = %endpoint, "coordination observer starting");
        *session = Some(tokio::spawn(run_session(
            endpoint,
            policy,
            self.state_tx.clone(),
            self.stop_tx.subscribe(),
        )));
    }

    /// Close the session and transition to `Closed`. Idempotent, and safe to
    /// call even if `start()` was never invoked.
    pub async fn stop(&self) {
        let _ = self.stop_tx.send(true);

        let task = self
            .session
            .lock()
            .expect("observer session lock poisoned")
            .take();

        if let Some(mut task) = task {
            // The session task honors the stop flag at every await point;
            // the timeout is a backstop, not the expected path.
            if tokio::time::timeout(Duration::from_secs(2), &mut task)
                .await
                .is_err()
            {
                tracing::warn!("coordination session task did not exit in time; aborting");
                task.abort();
            }
        }

        publish(&self.state_tx, SessionState::Closed);
    }
}

impl Default for CoordinationObserver {
    fn default() -> Self {
        Self::new()
    }
}

struct SessionPolicy {
    connect_timeout: Duration,
    backoff_base_ms: u64,
    backoff_max_ms: u64,
}

/// Publish a state transition, skipping no-op re-sends.
fn publish(tx: &watch::Sender<SessionState>, state: SessionState) {
    let modified = tx.send_if_modified(|current| {
        if *current == state {
            false
        } else {
            *current = state;
            true
        }
    });
    if modified {
        tracing::debug!(state = %state, "coordination session state changed");
        metrics::record_coordination_transition(state);
    }
}

/// Session maintenance loop: connect, hold, reconnect with backoff.
async fn run_session(
    endpoint: CoordinationEndpoint,
    policy: SessionPolicy,
    state_tx: watch::Sender<SessionState>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut attempt: u32 = 0;

    loop {
        if *stop_rx.borrow() {
            return;
        }

        let delay = reconnect_delay(attempt, policy.backoff_base_ms, policy.backoff_max_ms);
        if !delay.is_zero() {
            tokio::select! {
                _ = stop_rx.changed() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        publish(&state_tx, SessionState::Connecting);

        match dial(&endpoint, policy.connect_timeout, &mut stop_rx).await {
            Dial::Stopped => return,
            Dial::Failed => {
                publish(&state_tx, SessionState::Disconnected);
                attempt = attempt.saturating_add(1);
            }
            Dial::Session(stream, server) => {
                tracing::info!(server = %server, "coordination session established");
                publish(&state_tx, SessionState::Connected);
                attempt = 1;

                match hold(stream, &mut stop_rx).await {
                    Held::Stopped => return,
                    Held::Lost => {
                        tracing::warn!(server = %server, "coordination session lost");
                        publish(&state_tx, SessionState::Disconnected);
                    }
                }
            }
        }
    }
}

enum Dial {
    Session(TcpStream, String),
    Failed,
    Stopped,
}

/// Try each ensemble server in order until one accepts a connection.
async fn dial(
    endpoint: &CoordinationEndpoint,
    connect_timeout: Duration,
    stop_rx: &mut watch::Receiver<bool>,
) -> Dial {
    for server in endpoint.servers() {
        let connect = tokio::time::timeout(connect_timeout, TcpStream::connect(server.as_str()));
        tokio::select! {
            _ = stop_rx.changed() => return Dial::Stopped,
            result = connect => match result {
                Ok(Ok(stream)) => return Dial::Session(stream, server.clone()),
                Ok(Err(e)) => {
                    tracing::debug!(server = %server, error = %e, "coordination connect failed");
                }
                Err(_) => {
                    tracing::debug!(server = %server, "coordination connect timed out");
                }
            }
        }
    }
    Dial::Failed
}

enum Held {
    Lost,
    Stopped,
}

/// Hold an established session until the peer closes it or stop is signalled.
async fn hold(mut stream: TcpStream, stop_rx: &mut watch::Receiver<bool>) -> Held {
    let mut buf = [0u8; 256];
    loop {
        tokio::select! {
            _ = stop_rx.changed() => return Held::Stopped,
            read = stream.read(&mut buf) => match read {
                Ok(0) | Err(_) => return Held::Lost,
                Ok(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;

    fn test_config() -> CoordinationConfig {
        CoordinationConfig {
            endpoint: String::new(),
            connect_timeout_ms: 500,
            backoff_base_ms: 20,
            backoff_max_ms: 100,
        }
    }

    async fn wait_for(handle: &mut StateHandle, want: SessionState) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while handle.current() != want {
                handle.changed().await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {want}"));
    }

    /// Accept connections and hold them open until the task is aborted.
    fn hold_connections(listener: TcpListener) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut held = Vec::new();
            loop {
                if let Ok((socket, _)) = listener.accept().await {
                    held.push(socket);
                }
            }
        })
    }

    #[tokio::test]
    async fn not_started_until_start_is_called() {
        let observer = CoordinationObserver::new();
        assert_eq!(observer.current_state(), SessionState::NotStarted);
        assert_eq!(observer.subscribe().current(), SessionState::NotStarted);
    }

    #[tokio::test]
    async fn stop_without_start_closes() {
        let observer = CoordinationObserver::new();
        observer.stop().await;
        assert_eq!(observer.current_state(), SessionState::Closed);

        // and stays closed
        observer.stop().await;
        assert_eq!(observer.current_state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn start_after_stop_is_ignored() {
        let observer = CoordinationObserver::new();
        observer.stop().await;

        observer.start("127.0.0.1:2181".parse().unwrap(), &test_config());
        assert_eq!(observer.current_state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn connects_to_a_live_backend() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let backend = hold_connections(listener);

        let observer = CoordinationObserver::new();
        let mut handle = observer.subscribe();
        observer.start(addr.to_string().parse().unwrap(), &test_config());

        wait_for(&mut handle, SessionState::Connected).await;

        observer.stop().await;
        assert_eq!(observer.current_state(), SessionState::Closed);
        backend.abort();
    }

    #[tokio::test]
    async fn reconnects_after_session_loss() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let backend = hold_connections(listener);

        let observer = CoordinationObserver::new();
        let mut handle = observer.subscribe();
        observer.start(addr.to_string().parse().unwrap(), &test_config());
        wait_for(&mut handle, SessionState::Connected).await;

        // Kill the backend: held sockets drop, session read fails.
        backend.abort();
        wait_for(&mut handle, SessionState::Disconnected).await;

        // Bring the backend up again on the same address.
        let listener = TcpListener::bind(addr).await.unwrap();
        let backend = hold_connections(listener);
        wait_for(&mut handle, SessionState::Connected).await;

        observer.stop().await;
        backend.abort();
    }

    #[tokio::test]
    async fn unreachable_backend_reports_disconnected() {
        // Bind and immediately drop to find a port with nothing listening.
        let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = probe.local_addr().unwrap();
        drop(probe);

        let observer = CoordinationObserver::new();
        let mut handle = observer.subscribe();
        observer.start(addr.to_string().parse().unwrap(), &test_config());

        wait_for(&mut handle, SessionState::Disconnected).await;
        observer.stop().await;
    }
}
