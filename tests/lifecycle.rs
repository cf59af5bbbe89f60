//! Lifecycle sequencing tests: startup order, failure asymmetry, teardown.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};

use watchgate::config::ServiceConfig;
use watchgate::net::BindError;
use watchgate::proto::StatusHandlerFactory;
use watchgate::{
    LifecycleState, ServiceLifecycleController, SessionState, StartError, TerminationReason,
};

mod common;

fn test_config(port: u16, endpoint: &str) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.listener.listen_port = port;
    config.listener.drain_grace_ms = 500;
    config.coordination.endpoint = endpoint.to_string();
    config.coordination.connect_timeout_ms = 500;
    config.coordination.backoff_base_ms = 20;
    config.coordination.backoff_max_ms = 100;
    config
}

fn controller(config: ServiceConfig) -> ServiceLifecycleController {
    ServiceLifecycleController::new(config, Arc::new(StatusHandlerFactory))
}

#[tokio::test]
async fn start_then_stop_releases_all_resources() {
    let (coord_addr, coordinator) = common::start_mock_coordinator().await;
    let port = common::free_port().await;

    let controller = controller(test_config(port, &coord_addr.to_string()));
    controller.start().await.unwrap();
    assert_eq!(controller.state(), LifecycleState::Running);

    controller.stop().await;
    assert_eq!(controller.state(), LifecycleState::Stopped);
    assert_eq!(controller.observer().current(), SessionState::Closed);

    // The socket is released: the port can be bound again.
    TcpListener::bind(("0.0.0.0", port)).await.unwrap();

    coordinator.abort();
}

#[tokio::test]
async fn bind_conflict_fails_without_starting_observer() {
    let port = common::free_port().await;
    let _occupier = TcpListener::bind(("0.0.0.0", port)).await.unwrap();

    let controller = controller(test_config(port, "127.0.0.1:2181"));
    let err = controller.start().await.unwrap_err();

    assert!(matches!(
        err,
        StartError::BindFailed(BindError::AddressInUse(_))
    ));
    assert_eq!(controller.state(), LifecycleState::Failed);
    // The observer must never have been started.
    assert_eq!(controller.observer().current(), SessionState::NotStarted);
}

#[tokio::test]
async fn invalid_port_zero_fails_fast() {
    let controller = controller(test_config(0, "127.0.0.1:2181"));
    let err = controller.start().await.unwrap_err();

    assert!(matches!(
        err,
        StartError::BindFailed(BindError::InvalidPort)
    ));
    assert_eq!(controller.state(), LifecycleState::Failed);
    assert_eq!(controller.observer().current(), SessionState::NotStarted);
}

#[tokio::test]
async fn stop_is_idempotent() {
    let (coord_addr, coordinator) = common::start_mock_coordinator().await;
    let port = common::free_port().await;

    let controller = controller(test_config(port, &coord_addr.to_string()));
    controller.start().await.unwrap();

    controller.stop().await;
    assert_eq!(controller.state(), LifecycleState::Stopped);

    // Second stop: same end state, no panic, returns promptly.
    tokio::time::timeout(Duration::from_secs(1), controller.stop())
        .await
        .unwrap();
    assert_eq!(controller.state(), LifecycleState::Stopped);

    coordinator.abort();
}

#[tokio::test]
async fn stop_from_failed_completes_cleanup() {
    let port = common::free_port().await;
    let _occupier = TcpListener::bind(("0.0.0.0", port)).await.unwrap();

    let controller = controller(test_config(port, "127.0.0.1:2181"));
    assert!(controller.start().await.is_err());
    assert_eq!(controller.state(), LifecycleState::Failed);

    controller.stop().await;
    assert_eq!(controller.state(), LifecycleState::Stopped);
    assert_eq!(controller.observer().current(), SessionState::Closed);
}

#[tokio::test]
async fn start_after_stop_is_rejected() {
    let controller = controller(test_config(common::free_port().await, "127.0.0.1:2181"));
    controller.stop().await;
    assert_eq!(controller.state(), LifecycleState::Stopped);

    assert!(matches!(
        controller.start().await,
        Err(StartError::NotIdle(LifecycleState::Stopped))
    ));
}

#[tokio::test]
async fn await_termination_reports_graceful_shutdown() {
    let (coord_addr, coordinator) = common::start_mock_coordinator().await;
    let port = common::free_port().await;

    let controller = Arc::new(controller(test_config(port, &coord_addr.to_string())));
    controller.start().await.unwrap();

    let stopper = controller.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        stopper.stop().await;
    });

    let reason = tokio::time::timeout(Duration::from_secs(5), controller.await_termination())
        .await
        .unwrap();
    assert_eq!(reason, TerminationReason::GracefulShutdown);

    coordinator.abort();
}

#[tokio::test]
async fn stop_force_closes_stubborn_connections() {
    use futures_util::future::BoxFuture;
    use watchgate::{Inbound, StateHandle};

    // A handler that ignores both the peer and the drain signal.
    let stubborn = Arc::new(
        |conn: Inbound, _observer: StateHandle| -> BoxFuture<'static, ()> {
            Box::pin(async move {
                let _conn = conn;
                std::future::pending::<()>().await;
            })
        },
    );

    let (coord_addr, coordinator) = common::start_mock_coordinator().await;
    let port = common::free_port().await;
    let mut config = test_config(port, &coord_addr.to_string());
    config.listener.drain_grace_ms = 200;

    let controller = ServiceLifecycleController::new(config, stubborn);
    controller.start().await.unwrap();

    let _client = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    // Give the accept loop a moment to hand the connection off.
    tokio::time::sleep(Duration::from_millis(100)).await;

    // stop() must finish despite the handler never cooperating.
    tokio::time::timeout(Duration::from_secs(5), controller.stop())
        .await
        .unwrap();
    assert_eq!(controller.state(), LifecycleState::Stopped);

    coordinator.abort();
}
