//! Command-line sync client.
//!
//! Connects to the configured route, logs every model change it receives and
//! sends each JSON line read from stdin as a view command.

use anyhow::Result;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use model_sync::client::{ClientOptions, ConnectionManager, PageLocation, TungsteniteTransport};
use model_sync::config::Settings;
use model_sync::shutdown::shutdown_signal;
use model_sync::telemetry::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::new()?;
    init_tracing(&settings.logging);

    let location = PageLocation::parse(&settings.client.page_url)?;
    let handle = ConnectionManager::spawn(
        &location,
        &settings.client.route,
        |change: Value| tracing::info!(change = %change, "Model change received"),
        TungsteniteTransport,
        ClientOptions::from(&settings.client),
    );
    tracing::info!(url = %handle.url(), "Sync client started");

    let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
    tokio::spawn(shutdown_signal(shutdown_tx));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            line = lines.next_line() => match line? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => match serde_json::from_str::<Value>(&line) {
                    Ok(command) => {
                        if let Err(e) = handle.send(&command) {
                            tracing::warn!(error = %e, "Command not sent");
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "Ignoring non-JSON input line"),
                },
                // stdin closed; keep listening for changes until a signal arrives
                None => {
                    let _ = shutdown_rx.recv().await;
                    break;
                }
            },
        }
    }

    handle.shutdown().await;
    tracing::info!("Sync client stopped");
    Ok(())
}
