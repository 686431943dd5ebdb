use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tower_http::{decompression::RequestDecompressionLayer, services::ServeDir};
use tracing::{error, info};

use super::{
    services::{
        download_file, download_start, download_status, download_sync, formats, health,
        impersonation_status,
    },
    state::AppState,
};
use crate::backend::{SpotdlService, YtDlpBackend};
use crate::capabilities::CapabilitySnapshot;
use crate::config::Config;
use crate::jobs::spawn_sweeper;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Build the HTTP router for `state`.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/formats", post(formats))
        .route("/download", post(download_sync))
        .route("/download/start", post(download_start))
        .route("/download/status/{job_id}", get(download_status))
        .route("/download/file/{job_id}", get(download_file))
        .route("/impersonation-status", get(impersonation_status));

    let mut app = Router::new()
        .nest("/api", api)
        .route("/health", get(health));

    if let Some(dir) = &state.config.server.static_dir {
        info!(path = %dir.display(), "Serving static files");
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.with_state(state)
        // Automatically decompress gzip request bodies
        .layer(RequestDecompressionLayer::new())
}

/// Run the server until ctrl-c or SIGTERM.
///
/// `address` overrides `server.bind_addr` when given.
pub async fn run(config: Config, address: Option<SocketAddr>) -> Result<(), AnyError> {
    let downloads_dir = config.storage.downloads_dir.clone();
    tokio::fs::create_dir_all(&downloads_dir)
        .await
        .map_err(|e| format!("Failed to create {}: {e}", downloads_dir.display()))?;
    info!(path = %downloads_dir.display(), "Downloads directory ready");

    let tools = config.tools.clone();
    let capabilities = tokio::task::spawn_blocking(move || CapabilitySnapshot::detect(&tools))
        .await
        .map_err(|e| format!("Capability detection failed: {e}"))?;

    let backend = Arc::new(YtDlpBackend::new(config.tools.ytdlp.clone()));
    let streaming = Arc::new(SpotdlService::new(
        config.tools.spotdl.clone(),
        downloads_dir.clone(),
    ));

    let address = address.unwrap_or(config.server.bind_addr);
    let retention = config.retention.clone();
    let state = AppState::new(config, capabilities, backend, streaming);

    let sweeper = spawn_sweeper(
        Arc::clone(&state.registry),
        &retention,
        downloads_dir,
        Arc::clone(&state.metrics),
    );

    let app = router(state);
    let listener = TcpListener::bind(address).await?;
    info!(%address, "mediabox API listening");

    let served = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await;

    sweeper.abort();
    served?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
