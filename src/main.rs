//! repeat-client: automation client for the Repeat server

use clap::Parser;
use repeat_client::{ActionRegistry, Cli, Client, TaskManager};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("repeat_client=debug")
    } else {
        EnvFilter::new("repeat_client=info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config();
    info!(port = config.port, "Using server port");

    let client = Client::new(config);
    let tasks = TaskManager::new(client.controller(), Arc::new(ActionRegistry::new()));
    let mut client = client.with_dispatcher(Arc::new(tasks));

    if let Err(e) = client.start().await {
        error!("{}", e);
        std::process::exit(1);
    }

    tokio::select! {
        () = shutdown_signal() => info!("Shutdown requested"),
        () = client.terminated() => info!("Connection closed by server"),
    }

    client.stop().await;
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
