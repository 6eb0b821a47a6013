//! Server-side socket abstraction.
//!
//! Model callbacks are synchronous, so sends never await: [`ChannelSocket`]
//! enqueues frames for the connection's writer task and reports the outcome
//! as a typed [`SendError`].

use std::sync::atomic::{AtomicBool, Ordering};

use axum::extract::ws::Message;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Why a send did not reach the socket
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// The socket is gone; the connection has reached end of life
    #[error("WebSocket is not open")]
    SocketClosed,

    /// The socket is alive but this frame could not be written
    #[error("WebSocket send failed: {0}")]
    SendFailed(String),
}

/// Socket capability the connection handler writes through
pub trait SyncSocket: Send + Sync {
    fn send(&self, text: String) -> Result<(), SendError>;

    fn close(&self);
}

/// Socket backed by a bounded channel drained by a writer task
pub struct ChannelSocket {
    sender: mpsc::Sender<Message>,
    open: AtomicBool,
}

impl ChannelSocket {
    pub fn new(sender: mpsc::Sender<Message>) -> Self {
        Self {
            sender,
            open: AtomicBool::new(true),
        }
    }

    /// Record that the peer's stream has ended without closing the writer
    pub fn mark_closed(&self) {
        self.open.store(false, Ordering::Release);
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.sender.is_closed()
    }
}

impl SyncSocket for ChannelSocket {
    fn send(&self, text: String) -> Result<(), SendError> {
        if !self.open.load(Ordering::Acquire) {
            return Err(SendError::SocketClosed);
        }

        match self.sender.try_send(Message::Text(text.into())) {
            Ok(()) => Ok(()),
            Err(TrySendError::Closed(_)) => {
                self.mark_closed();
                Err(SendError::SocketClosed)
            }
            Err(TrySendError::Full(_)) => Err(SendError::SendFailed(format!(
                "outbound buffer full ({} frames)",
                self.sender.max_capacity()
            ))),
        }
    }

    fn close(&self) {
        self.mark_closed();
        // The writer stops after forwarding the close frame
        let _ = self.sender.try_send(Message::Close(None));
    }
}
