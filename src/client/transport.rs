//! Client transport seam.
//!
//! The manager sees a connected socket as a stream of [`SocketEvent`]s plus
//! `send_text`/`close`. [`TungsteniteTransport`] is the network implementation.

use std::sync::Once;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::ClientError;

/// Event observed on an open socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Message(String),
    Error(String),
    Closed,
}

/// A connected client socket
#[async_trait]
pub trait ClientSocket: Send {
    async fn send_text(&mut self, text: String) -> Result<(), ClientError>;

    /// Wait for the next event; `Closed` once the peer is gone
    async fn next_event(&mut self) -> SocketEvent;

    async fn close(&mut self);
}

/// Opens client sockets
#[async_trait]
pub trait ClientTransport: Send + Sync {
    /// `Ok` is the open event; `Err` is a refused connection
    async fn connect(&self, url: &str) -> Result<Box<dyn ClientSocket>, ClientError>;
}

/// `ws://` and `wss://` transport over tokio-tungstenite; TLS uses rustls with webpki roots
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteTransport;

/// Install the ring provider as the process default unless one is already set
fn install_crypto_provider() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        if rustls::crypto::ring::default_provider().install_default().is_err() {
            tracing::debug!("rustls crypto provider already installed");
        }
    });
}

#[async_trait]
impl ClientTransport for TungsteniteTransport {
    async fn connect(&self, url: &str) -> Result<Box<dyn ClientSocket>, ClientError> {
        install_crypto_provider();

        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        Ok(Box::new(TungsteniteSocket { stream }))
    }
}

struct TungsteniteSocket {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl ClientSocket for TungsteniteSocket {
    async fn send_text(&mut self, text: String) -> Result<(), ClientError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }

    async fn next_event(&mut self) -> SocketEvent {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return SocketEvent::Message(text.as_str().to_owned()),
                Some(Ok(Message::Close(_))) | None => return SocketEvent::Closed,
                // Control and binary frames carry nothing for the interpreter
                Some(Ok(_)) => continue,
                Some(Err(e)) => return SocketEvent::Error(e.to_string()),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!(error = %e, "Closing client socket failed");
        }
    }
}
