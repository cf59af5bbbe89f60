//! The connection handler seam.
//!
//! The listener knows nothing about wire protocols. Each accepted connection
//! is handed to a `ConnectionHandlerFactory`, which builds the future that
//! owns that connection's entire lifetime. Concrete protocols are dynamic
//! implementations behind this one-method capability.

use std::net::SocketAddr;

use futures_util::future::BoxFuture;
use tokio::net::TcpStream;
use tokio::sync::watch;

use crate::coord::StateHandle;

/// An accepted connection, bundled with the signals a handler needs.
pub struct Inbound {
    /// The connection socket. The handler owns it.
    pub stream: TcpStream,

    /// Remote peer address, for logging.
    pub peer: SocketAddr,

    /// Flips to `true` when the listener is draining; handlers should
    /// finish up promptly once it does. Handlers that ignore it are
    /// force-aborted after the grace period.
    pub closing: watch::Receiver<bool>,
}

/// Builds a handler for each accepted connection.
///
/// The observer handle passed in may still be in `NotStarted` or
/// `Connecting`: handlers must serve with whatever coordination state
/// exists, and state reads never block.
pub trait ConnectionHandlerFactory: Send + Sync + 'static {
    /// Construct the future that services one connection.
    fn create(&self, conn: Inbound, observer: StateHandle) -> BoxFuture<'static, ()>;
}

impl<F> ConnectionHandlerFactory for F
where
    F: Fn(Inbound, StateHandle) -> BoxFuture<'static, ()> + Send + Sync + 'static,
{
    fn create(&self, conn: Inbound, observer: StateHandle) -> BoxFuture<'static, ()> {
        self(conn, observer)
    }
}
