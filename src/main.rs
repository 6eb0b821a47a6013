use anyhow::Result;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use model_sync::config::Settings;
use model_sync::server::{create_app, AppState};
use model_sync::shutdown::shutdown_signal;
use model_sync::telemetry::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;
    init_tracing(&settings.logging);
    tracing::info!("Configuration loaded");

    // Changes enter through POST /api/changes; client commands are logged only
    let state = AppState::new(settings.clone());
    tracing::info!(route = %settings.websocket.route, "Application state initialized");

    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    let (shutdown_tx, _) = broadcast::channel(1);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}
