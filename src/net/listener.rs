//! TCP listener: bind, bounded accept loop, drain-and-force close.
//!
//! # Responsibilities
//! - Bind the configured port (synchronously, so bind errors surface to the
//!   caller) and run the accept loop on its own task
//! - Enforce max_connections via semaphore backpressure
//! - Hand each accepted connection to the handler factory
//! - On close: stop accepting, release the socket, signal handlers to drain,
//!   force-abort stragglers after the grace period
//! - Report unrecoverable accept faults to the lifecycle controller

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};

use crate::config::ListenerConfig;
use crate::coord::StateHandle;
use crate::net::connection::ConnectionTracker;
use crate::net::handler::{ConnectionHandlerFactory, Inbound};
use crate::observability::metrics;

/// Error type for bind failures. These are fatal: the usual causes are
/// operator problems (port taken, insufficient privilege), not transient
/// conditions worth retrying.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("invalid listen port 0")]
    InvalidPort,

    #[error("listen address already in use")]
    AddressInUse(#[source] std::io::Error),

    #[error("permission denied binding listen address")]
    PermissionDenied(#[source] std::io::Error),

    #[error("failed to bind listener: {0}")]
    Other(std::io::Error),
}

fn classify_bind_error(e: std::io::Error) -> BindError {
    match e.kind() {
        std::io::ErrorKind::AddrInUse => BindError::AddressInUse(e),
        std::io::ErrorKind::PermissionDenied => BindError::PermissionDenied(e),
        _ => BindError::Other(e),
    }
}

/// Ownership of a bound, accepting listener.
///
/// `close(self)` consumes the handle, so releasing it twice is a compile
/// error rather than a latent double-close bug.
pub struct ListenerHandle {
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    fault_rx: watch::Receiver<bool>,
    tracker: ConnectionTracker,
    accept_task: JoinHandle<()>,
    drain_grace: Duration,
}

impl ListenerHandle {
    /// The address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Receiver that flips to `true` if the accept loop dies on an
    /// unrecoverable error.
    pub fn fault_signal(&self) -> watch::Receiver<bool> {
        self.fault_rx.clone()
    }

    /// Current number of in-flight connections.
    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Stop accepting, release the socket, drain in-flight connections up
    /// to the grace period, then force-close whatever remains.
    pub async fn close(mut self) {
        tracing::info!(address = %self.local_addr, "listener closing");
        let _ = self.shutdown_tx.send(true);

        // The accept loop owns the drain sequence; give it the grace period
        // plus headroom before falling back to abort.
        let deadline = self.drain_grace + Duration::from_secs(1);
        match tokio::time::timeout(deadline, &mut self.accept_task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "accept loop ended abnormally"),
            Err(_) => {
                tracing::warn!("accept loop did not stop within the grace period; aborting");
                self.accept_task.abort();
            }
        }
    }
}

/// Bind the configured port and start accepting.
///
/// Binding is synchronous: when this returns `Ok`, the socket is held and
/// the accept loop is running on its own task. The caller continues
/// immediately.
pub async fn bind_and_serve(
    config: &ListenerConfig,
    factory: Arc<dyn ConnectionHandlerFactory>,
    observer: StateHandle,
) -> Result<ListenerHandle, BindError> {
    // The OS would happily turn port 0 into an ephemeral port; reject it
    // before any syscall.
    if config.listen_port == 0 {
        return Err(BindError::InvalidPort);
    }

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.listen_port));
    let listener = TcpListener::bind(addr).await.map_err(classify_bind_error)?;
    let local_addr = listener.local_addr().map_err(BindError::Other)?;

    tracing::info!(
        address = %local_addr,
        max_connections = config.max_connections,
        "listener bound"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (closing_tx, _) = watch::channel(false);
    let (fault_tx, fault_rx) = watch::channel(false);
    let tracker = ConnectionTracker::new();

    let accept_task = tokio::spawn(accept_loop(AcceptLoop {
        bounded: BoundedListener {
            inner: listener,
            limit: Arc::new(Semaphore::new(config.max_connections)),
        },
        factory,
        observer,
        shutdown_rx,
        closing_tx,
        fault_tx,
        tracker: tracker.clone(),
        drain_grace: Duration::from_millis(config.drain_grace_ms),
    }));

    Ok(ListenerHandle {
        local_addr,
        shutdown_tx,
        fault_rx,
        tracker,
        accept_task,
        drain_grace: Duration::from_millis(config.drain_grace_ms),
    })
}

/// A TCP listener that limits concurrent connections with a semaphore.
/// When the limit is reached, accepting waits until a slot frees up.
struct BoundedListener {
    inner: TcpListener,
    limit: Arc<Semaphore>,
}

impl BoundedListener {
    async fn accept(
        &self,
    ) -> std::io::Result<(TcpStream, SocketAddr, tokio::sync::OwnedSemaphorePermit)> {
        // Acquire the permit first so a full service stops accepting
        // instead of queueing unbounded connections.
        let permit = self
            .limit
            .clone()
            .acquire_owned()
            .await
            .expect("connection semaphore closed unexpectedly");

        let (stream, addr) = self.inner.accept().await?;
        Ok((stream, addr, permit))
    }
}

struct AcceptLoop {
    bounded: BoundedListener,
    factory: Arc<dyn ConnectionHandlerFactory>,
    observer: StateHandle,
    shutdown_rx: watch::Receiver<bool>,
    closing_tx: watch::Sender<bool>,
    fault_tx: watch::Sender<bool>,
    tracker: ConnectionTracker,
    drain_grace: Duration,
}

async fn accept_loop(mut ctx: AcceptLoop) {
    let mut handlers: JoinSet<()> = JoinSet::new();

    loop {
        tokio::select! {
            _ = ctx.shutdown_rx.changed() => break,

            accepted = ctx.bounded.accept() => match accepted {
                Ok((stream, peer, permit)) => {
                    let guard = ctx.tracker.track();
                    metrics::record_accepted();
                    tracing::debug!(connection_id = %guard.id(), peer = %peer, "connection accepted");

                    let conn = Inbound {
                        stream,
                        peer,
                        closing: ctx.closing_tx.subscribe(),
                    };
                    let handler = ctx.factory.create(conn, ctx.observer.clone());
                    handlers.spawn(async move {
                        // Permit and guard live exactly as long as the handler.
                        let _permit = permit;
                        let _guard = guard;
                        handler.await;
                    });
                }
                Err(e) if is_transient_accept_error(&e) => {
                    tracing::warn!(error = %e, "transient accept error");
                }
                Err(e) => {
                    tracing::error!(error = %e, "unrecoverable accept error, listener faulted");
                    let _ = ctx.fault_tx.send(true);
                    break;
                }
            },

            Some(finished) = handlers.join_next(), if !handlers.is_empty() => {
                reap(finished);
            }
        }
    }

    // Release the socket before draining so the port frees immediately.
    drop(ctx.bounded);
    let _ = ctx.closing_tx.send(true);

    if !handlers.is_empty() {
        tracing::info!(
            active = handlers.len(),
            grace_ms = ctx.drain_grace.as_millis() as u64,
            "draining in-flight connections"
        );
        if tokio::time::timeout(ctx.drain_grace, drain(&mut handlers))
            .await
            .is_err()
        {
            tracing::warn!(
                remaining = handlers.len(),
                "grace period elapsed, forcing connections closed"
            );
            handlers.abort_all();
            drain(&mut handlers).await;
        }
    }

    tracing::info!("listener stopped");
}

async fn drain(handlers: &mut JoinSet<()>) {
    while let Some(finished) = handlers.join_next().await {
        reap(finished);
    }
}

fn reap(finished: Result<(), tokio::task::JoinError>) {
    // Per-connection failures stay isolated to their task; a panicking
    // handler must never take the listener down with it.
    if let Err(e) = finished {
        if !e.is_cancelled() {
            tracing::warn!(error = %e, "connection handler panicked");
        }
    }
}

fn is_transient_accept_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::Interrupted
    )
}
