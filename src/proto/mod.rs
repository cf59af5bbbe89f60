//! Minimal status line protocol.
//!
//! The shipped binary needs to serve something observable; this handler
//! greets each client with the current coordination-session state and then
//! answers a trivial line protocol: `state` returns the current state,
//! anything else is echoed back. Real deployments swap in their own
//! `ConnectionHandlerFactory`.

use futures_util::future::BoxFuture;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::coord::StateHandle;
use crate::net::{ConnectionHandlerFactory, Inbound};

/// Factory for the status line protocol.
pub struct StatusHandlerFactory;

impl ConnectionHandlerFactory for StatusHandlerFactory {
    fn create(&self, conn: Inbound, observer: StateHandle) -> BoxFuture<'static, ()> {
        Box::pin(serve(conn, observer))
    }
}

async fn serve(conn: Inbound, observer: StateHandle) {
    let Inbound {
        stream,
        peer,
        mut closing,
    } = conn;

    let (read_half, mut write_half) = stream.into_split();

    let greeting = format!("coordination: {}\r\n", observer.current());
    if write_half.write_all(greeting.as_bytes()).await.is_err() {
        return;
    }

    let mut lines = BufReader::new(read_half).lines();
    loop {
        tokio::select! {
            _ = closing.changed() => {
                if *closing.borrow() {
                    let _ = write_half.write_all(b"closing\r\n").await;
                    break;
                }
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let reply = if line.trim().eq_ignore_ascii_case("state") {
                        format!("coordination: {}\r\n", observer.current())
                    } else {
                        format!("{}\r\n", line)
                    };
                    if write_half.write_all(reply.as_bytes()).await.is_err() {
                        break;
                    }
                }
                Ok(None) | Err(_) => break,
            }
        }
    }

    tracing::debug!(peer = %peer, "status connection finished");
}
