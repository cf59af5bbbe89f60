//! Shared utilities for integration tests.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Start a mock coordination backend: accepts connections and holds them
/// open until the returned task is aborted.
pub async fn start_mock_coordinator() -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let task = tokio::spawn(async move {
        let mut held = Vec::new();
        loop {
            if let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        }
    });

    (addr, task)
}

/// Find a TCP port that is currently free.
///
/// Binds an ephemeral port and releases it; the brief race with other
/// processes is acceptable in tests.
pub async fn free_port() -> u16 {
    let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = probe.local_addr().unwrap().port();
    drop(probe);
    port
}

/// An endpoint with nothing listening behind it: connections get refused.
#[allow(dead_code)]
pub async fn unreachable_endpoint() -> String {
    format!("127.0.0.1:{}", free_port().await)
}

/// Wait until the observer reports `want`, failing the test after 5s.
#[allow(dead_code)]
pub async fn wait_for_state(handle: &mut watchgate::StateHandle, want: watchgate::SessionState) {
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while handle.current() != want {
            handle.changed().await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {want}"));
}
