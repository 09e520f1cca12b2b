use anyhow::Result;
use tokio::signal;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pulsecast::config::Settings;
use pulsecast::server::{create_app, serve, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    init_tracing();

    // Load configuration
    let settings = Settings::new()?;
    tracing::info!("Configuration loaded");

    // Shutdown fan-out for the broadcast loop and per-connection tickers
    let (shutdown_tx, _) = broadcast::channel(1);

    // Create application state
    let state = AppState::new(settings.clone(), shutdown_tx.clone());
    tracing::info!("Application state initialized");

    // Run the broadcast loop in the background, supervised: an abnormal exit
    // is logged and the loop is restarted so subscribers are never left
    // without a ticker.
    let broadcaster = state.broadcaster.clone();
    let mut supervisor_shutdown = shutdown_tx.subscribe();
    let broadcast_handle = tokio::spawn(async move {
        loop {
            let broadcaster = broadcaster.clone();
            let loop_task = tokio::spawn(async move { broadcaster.run().await });
            match loop_task.await {
                Ok(()) => break,
                Err(e) => {
                    tracing::error!(error = %e, "Broadcast loop terminated abnormally, restarting");
                    if supervisor_shutdown.try_recv().is_ok() {
                        break;
                    }
                }
            }
        }
    });

    // Create Axum app
    let app = create_app(state);

    // Run server with graceful shutdown
    let addr = settings.server_addr();
    serve(app, &addr, shutdown_signal_handler(shutdown_tx)).await?;

    // Wait for the broadcast loop to finish
    tracing::info!("Waiting for background tasks to finish...");
    let _ = broadcast_handle.await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal_handler(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }

    // Stop the broadcast loop and all per-connection tickers
    let _ = shutdown_tx.send(());
}
