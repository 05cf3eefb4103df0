//! Server lifecycle: bind, serve, drain on shutdown.

use std::time::Duration;

use tracing::{error, info};

use crate::http;
use crate::state::AppState;

/// How long background resolver/warmup tasks get to finish after the
/// listener stops.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn run(state: AppState) -> anyhow::Result<()> {
    let address = state.config.http_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("listening on {address}");

    let tasks = state.tasks.clone();
    let router = http::router(state);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Inflight resolver and warmup tasks finish after the HTTP side is
    // drained; they are never cancelled mid-write.
    tasks.close();
    if tokio::time::timeout(DRAIN_TIMEOUT, tasks.wait()).await.is_err() {
        error!("background tasks did not drain within {DRAIN_TIMEOUT:?}");
    }

    info!("shut down");
    Ok(())
}

/// Wait for a shutdown signal (SIGTERM or SIGINT/Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("received Ctrl+C"),
            Err(e) => error!("failed to install Ctrl+C handler: {e}"),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
                info!("received SIGTERM");
            }
            Err(e) => error!("failed to install SIGTERM handler: {e}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
