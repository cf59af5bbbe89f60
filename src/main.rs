use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use watchgate::config::loader::load_config;
use watchgate::config::validation::validate_config;
use watchgate::config::ServiceConfig;
use watchgate::lifecycle::{signals, ServiceLifecycleController, TerminationReason};
use watchgate::proto::StatusHandlerFactory;

#[derive(Parser)]
#[command(name = "watchgate")]
#[command(about = "Coordination-aware TCP service", long_about = None)]
struct Cli {
    /// TCP port to listen on.
    #[arg(value_name = "PORT")]
    port: Option<u16>,

    /// Coordination backend connection string: host:port[,host:port...].
    /// Falls back to the WATCHGATE_COORDINATION environment variable.
    #[arg(short = 'c', long = "coordination", value_name = "ENDPOINT")]
    coordination: Option<String>,

    /// Optional TOML configuration file. CLI flags override file values.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "watchgate=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("watchgate v0.1.0 starting");

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("failed to load config {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => ServiceConfig::default(),
    };

    if let Some(port) = cli.port {
        config.listener.listen_port = port;
    }
    if let Some(endpoint) = cli.coordination {
        config.coordination.endpoint = endpoint;
    } else if config.coordination.endpoint.is_empty() {
        if let Ok(endpoint) = std::env::var("WATCHGATE_COORDINATION") {
            config.coordination.endpoint = endpoint;
        }
    }

    if let Err(errors) = validate_config(&config) {
        eprintln!("invalid configuration:");
        for error in errors {
            eprintln!("  - {error}");
        }
        std::process::exit(1);
    }

    tracing::info!(
        port = config.listener.listen_port,
        coordination = %config.coordination.endpoint,
        max_connections = config.listener.max_connections,
        "configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => watchgate::observability::metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "failed to parse metrics address"
            ),
        }
    }

    let controller = Arc::new(ServiceLifecycleController::new(
        config,
        Arc::new(StatusHandlerFactory),
    ));

    if let Err(e) = controller.start().await {
        eprintln!("startup failed: {e}");
        std::process::exit(1);
    }

    if let Some(addr) = controller.local_addr() {
        println!("watchgate listening on {addr}");
    }

    // Translate OS signals into a graceful stop.
    let signal_target = controller.clone();
    tokio::spawn(async move {
        signals::shutdown_signal().await;
        signal_target.stop().await;
    });

    match controller.await_termination().await {
        TerminationReason::GracefulShutdown => {
            controller.stop().await;
            tracing::info!("shutdown complete");
        }
        TerminationReason::ListenerFault => {
            tracing::error!("listener fault, shutting down");
            controller.stop().await;
            std::process::exit(1);
        }
    }
}
