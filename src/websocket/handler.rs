use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::server::AppState;

use super::connection::SyncHandler;
use super::socket::ChannelSocket;

/// WebSocket upgrade handler
#[tracing::instrument(name = "ws.upgrade", skip(ws, state))]
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let handler = state.handler.clone();
    let buffer = state.settings.websocket.outbound_buffer;

    ws.on_upgrade(move |socket| handle_socket(socket, handler, buffer))
}

/// Drive an upgraded WebSocket until the client's stream ends.
///
/// Outbound frames flow through a bounded channel into a writer task so model
/// callbacks never await. Inbound text frames go to the connection's view path.
pub async fn handle_socket(socket: WebSocket, handler: Arc<SyncHandler>, buffer: usize) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Message>(buffer.max(1));

    let channel_socket = Arc::new(ChannelSocket::new(tx));
    let connection = handler.accept(channel_socket.clone());
    let connection_id = connection.id();

    // Ends when the socket errors, after a close frame, or when every sender is gone
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if ws_sender.send(msg).await.is_err() {
                break;
            }
            if closing {
                break;
            }
        }
        tracing::debug!(connection_id = %connection_id, "Writer task completed");
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => connection.handle_message(text.as_str()),
            Ok(Message::Binary(_)) => {
                tracing::warn!(connection_id = %connection_id, "Ignoring binary frame");
            }
            Ok(Message::Close(_)) => {
                tracing::debug!(connection_id = %connection_id, "Received close frame");
                break;
            }
            // Pings are answered by axum
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Err(e) => {
                tracing::warn!(connection_id = %connection_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    // Registration is released by the next model change that hits the closed socket
    let writer_alive = channel_socket.is_open();
    channel_socket.mark_closed();
    tracing::info!(
        connection_id = %connection_id,
        writer_alive = writer_alive,
        duration_secs = (chrono::Utc::now() - connection.connected_at()).num_seconds(),
        "Client stream ended"
    );
}
