//! The service lifecycle controller.
//!
//! # Responsibilities
//! - Sequence startup: bind listener, then start the coordination observer
//! - Gate readiness on the listener alone: the service runs (degraded) even
//!   if the coordination backend is unreachable
//! - Sequence shutdown in reverse dependency order: listener, then observer
//! - Surface listener faults to whoever waits on `await_termination`
//!
//! # Design Decisions
//! - Listener failure is fatal, observer failure is not: serving traffic is
//!   the primary duty, coordination state is auxiliary
//! - Bind failures are not retried; the usual causes (port taken,
//!   permission denied) need an operator, not a loop
//! - Shutdown-time release failures are logged and swallowed so `stop()`
//!   always completes

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;

use crate::config::ServiceConfig;
use crate::coord::endpoint::EndpointParseError;
use crate::coord::{CoordinationEndpoint, CoordinationObserver, StateHandle};
use crate::lifecycle::shutdown::{TerminationReason, TerminationSignal};
use crate::net::listener::{bind_and_serve, BindError, ListenerHandle};
use crate::net::ConnectionHandlerFactory;

/// Lifecycle of the whole service. One controller per process.
///
/// Transitions are monotonic except Running → ShuttingDown; the machine
/// never moves backward to Starting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Starting,
    Running,
    ShuttingDown,
    Stopped,
    Failed,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LifecycleState::Idle => "idle",
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::ShuttingDown => "shutting-down",
            LifecycleState::Stopped => "stopped",
            LifecycleState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Error type for `start()`. Bind problems are the only failures that
/// propagate; everything else the service absorbs into observable state.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("service cannot start from state {0}")]
    NotIdle(LifecycleState),

    #[error("coordination endpoint is invalid: {0}")]
    InvalidEndpoint(#[source] EndpointParseError),

    #[error("listener startup failed: {0}")]
    BindFailed(#[from] BindError),
}

/// Orchestrates the listener and the coordination observer.
///
/// Holds the subsystems' lifecycles, not their internals: the listener owns
/// its socket and tasks, the observer owns its session. The controller only
/// decides when each starts and stops.
pub struct ServiceLifecycleController {
    config: ServiceConfig,
    factory: Arc<dyn ConnectionHandlerFactory>,
    observer: CoordinationObserver,
    state: StdMutex<LifecycleState>,
    listener: AsyncMutex<Option<ListenerHandle>>,
    local_addr: StdMutex<Option<SocketAddr>>,
    termination: TerminationSignal,
}

impl ServiceLifecycleController {
    /// Build a controller around a validated config and a handler factory.
    ///
    /// The observer is constructed here, before anything runs, so handler
    /// factories can capture its state handle up front.
    pub fn new(config: ServiceConfig, factory: Arc<dyn ConnectionHandlerFactory>) -> Self {
        Self {
            config,
            factory,
            observer: CoordinationObserver::new(),
            state: StdMutex::new(LifecycleState::Idle),
            listener: AsyncMutex::new(None),
            local_addr: StdMutex::new(None),
            termination: TerminationSignal::new(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        *self.state.lock().expect("lifecycle state lock poisoned")
    }

    /// Read-only view of the coordination session state.
    pub fn observer(&self) -> StateHandle {
        self.observer.subscribe()
    }

    /// The bound listen address, once `start()` has succeeded.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().expect("local addr lock poisoned")
    }

    /// Start the service: bind the listener, then start the observer.
    ///
    /// Returns once the listener is bound and accepting, regardless of the
    /// observer's connection outcome: coordination is best-effort, serving
    /// is not. A bind failure aborts startup with `Failed`.
    pub async fn start(&self) -> Result<(), StartError> {
        {
            let mut state = self.state.lock().expect("lifecycle state lock poisoned");
            if *state != LifecycleState::Idle {
                return Err(StartError::NotIdle(*state));
            }
            *state = LifecycleState::Starting;
        }
        tracing::info!(port = self.config.listener.listen_port, "service starting");

        let endpoint = match self.config.coordination.endpoint.parse::<CoordinationEndpoint>() {
            Ok(endpoint) => endpoint,
            Err(e) => {
                self.set_state(LifecycleState::Failed);
                return Err(StartError::InvalidEndpoint(e));
            }
        };

        // Handlers capture the observer's state handle now, before the
        // observer starts; they must tolerate NotStarted/Connecting reads.
        let handle = bind_and_serve(
            &self.config.listener,
            self.factory.clone(),
            self.observer.subscribe(),
        )
        .await;
        let handle = match handle {
            Ok(handle) => handle,
            Err(e) => {
                // The observer has not been started yet, so a failed bind
                // leaves no session behind.
                self.set_state(LifecycleState::Failed);
                tracing::error!(error = %e, "startup aborted: listener bind failed");
                return Err(StartError::BindFailed(e));
            }
        };

        let addr = handle.local_addr();
        let fault_rx = handle.fault_signal();
        *self.local_addr.lock().expect("local addr lock poisoned") = Some(addr);
        *self.listener.lock().await = Some(handle);

        self.observer.start(endpoint, &self.config.coordination);

        // Forward listener faults to termination waiters. The forwarder
        // exits when the accept loop drops its side of the channel.
        let termination = self.termination.clone();
        tokio::spawn(async move {
            let mut fault_rx = fault_rx;
            while fault_rx.changed().await.is_ok() {
                if *fault_rx.borrow() {
                    termination.trigger(TerminationReason::ListenerFault);
                    break;
                }
            }
        });

        let raced_with_stop = {
            let mut state = self.state.lock().expect("lifecycle state lock poisoned");
            if *state == LifecycleState::Starting {
                *state = LifecycleState::Running;
                false
            } else {
                true
            }
        };
        if raced_with_stop {
            // A concurrent stop() won; unwind whatever it did not see.
            if let Some(handle) = self.listener.lock().await.take() {
                handle.close().await;
            }
            self.observer.stop().await;
            return Ok(());
        }

        tracing::info!(address = %addr, "service running");
        Ok(())
    }

    /// Suspend until a shutdown is requested or the listener faults.
    pub async fn await_termination(&self) -> TerminationReason {
        self.termination.wait().await
    }

    /// Stop the service. Idempotent; calling it on an already stopping or
    /// stopped controller is a no-op.
    pub async fn stop(&self) {
        {
            let mut state = self.state.lock().expect("lifecycle state lock poisoned");
            match *state {
                LifecycleState::ShuttingDown | LifecycleState::Stopped => return,
                _ => *state = LifecycleState::ShuttingDown,
            }
        }
        tracing::info!("service stopping");
        self.termination.trigger(TerminationReason::GracefulShutdown);

        // Reverse dependency order: listener first, observer second. Each
        // release bounds its own wait, so stop always completes.
        if let Some(handle) = self.listener.lock().await.take() {
            handle.close().await;
        }
        self.observer.stop().await;

        self.set_state(LifecycleState::Stopped);
        tracing::info!("service stopped");
    }

    fn set_state(&self, state: LifecycleState) {
        *self.state.lock().expect("lifecycle state lock poisoned") = state;
    }
}
