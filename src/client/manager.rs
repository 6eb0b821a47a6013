//! Client connection manager.
//!
//! One task per logical connection runs the state machine:
//!
//! ```text
//! Connecting --open--> Open --close/error--> Reconnecting --delay--> Connecting
//!      \--refused------------------------------^
//! ```
//!
//! The task owns the socket, the keepalive timer and the backoff state. The
//! keepalive timer is cleared on every close transition and again before
//! each connect attempt, so a stale timer never outlives its socket.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::metrics::ClientMetrics;

use super::backoff::{BackoffConfig, ReconnectBackoff};
use super::interpreter::Interpreter;
use super::location::PageLocation;
use super::transport::{ClientSocket, ClientTransport, SocketEvent};

pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);

/// Commands buffered between the handle and the open socket
const OUTBOUND_BUFFER_SIZE: usize = 32;

/// Observable connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Open,
    Reconnecting,
    /// Only reached through [`ClientHandle::shutdown`]
    Stopped,
}

/// Control frames the client sends on its own
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ControlFrame {
    Keepalive,
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub keepalive_interval: Duration,
    pub backoff: BackoffConfig,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            backoff: BackoffConfig::default(),
        }
    }
}

impl From<&ClientConfig> for ClientOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            keepalive_interval: config.keepalive_interval(),
            backoff: BackoffConfig {
                base_delay: config.reconnect_base_delay(),
                max_multiplier: config.max_backoff_multiplier,
            },
        }
    }
}

/// Keepalive ticker owned by the open connection
struct KeepaliveTimer {
    interval: Interval,
}

impl KeepaliveTimer {
    fn start(period: Duration) -> Self {
        let period = period.max(Duration::from_millis(1));
        // First tick one full period after open
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

async fn keepalive_tick(timer: &mut Option<KeepaliveTimer>) {
    match timer {
        Some(timer) => {
            timer.interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

enum SessionEnd {
    Closed,
    Shutdown,
}

enum Step {
    Shutdown,
    Keepalive,
    Outbound(String),
    Socket(SocketEvent),
}

/// Keeps one WebSocket to a fixed URL alive and feeds its messages to an interpreter
pub struct ConnectionManager {
    url: String,
    transport: Arc<dyn ClientTransport>,
    interpreter: Arc<dyn Interpreter>,
    backoff: ReconnectBackoff,
    keepalive_interval: Duration,
    keepalive: Option<KeepaliveTimer>,
    status: watch::Sender<ConnectionStatus>,
    outbound: mpsc::Receiver<String>,
    shutdown: broadcast::Receiver<()>,
}

impl ConnectionManager {
    /// Start managing a connection to `route` under `location`.
    ///
    /// The first connect attempt starts immediately on the current tokio
    /// runtime. Dropping the returned handle leaves the manager running.
    pub fn spawn<T, I>(
        location: &PageLocation,
        route: &str,
        interpreter: I,
        transport: T,
        options: ClientOptions,
    ) -> ClientHandle
    where
        T: ClientTransport + 'static,
        I: Interpreter + 'static,
    {
        let url = location.socket_url(route);
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connecting);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER_SIZE);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let manager = Self {
            url: url.clone(),
            transport: Arc::new(transport),
            interpreter: Arc::new(interpreter),
            backoff: ReconnectBackoff::with_config(options.backoff),
            keepalive_interval: options.keepalive_interval,
            keepalive: None,
            status: status_tx,
            outbound: outbound_rx,
            shutdown: shutdown_rx,
        };

        let task = tokio::spawn(manager.run());

        ClientHandle {
            url,
            status: status_rx,
            outbound: outbound_tx,
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn run(mut self) {
        tracing::info!(url = %self.url, "Client connection manager started");

        loop {
            self.clear_keepalive();
            self.set_status(ConnectionStatus::Connecting);

            let attempt = tokio::select! {
                Ok(()) = self.shutdown.recv() => break,
                attempt = self.transport.connect(&self.url) => attempt,
            };

            match attempt {
                Ok(socket) => {
                    if let SessionEnd::Shutdown = self.run_open(socket).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(url = %self.url, error = %e, "Connection attempt failed");
                }
            }

            self.clear_keepalive();
            self.drain_outbound();
            self.set_status(ConnectionStatus::Reconnecting);

            let delay = self.backoff.next_delay();
            ClientMetrics::record_reconnect_scheduled();
            tracing::info!(
                url = %self.url,
                delay_secs = delay.as_secs_f64(),
                next_multiplier = self.backoff.multiplier(),
                "Reconnect scheduled"
            );

            tokio::select! {
                Ok(()) = self.shutdown.recv() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.clear_keepalive();
        self.set_status(ConnectionStatus::Stopped);
        tracing::info!(url = %self.url, "Client connection manager stopped");
    }

    /// Serve one open socket until it closes or shutdown is requested
    async fn run_open(&mut self, mut socket: Box<dyn ClientSocket>) -> SessionEnd {
        self.backoff.reset();
        self.keepalive = Some(KeepaliveTimer::start(self.keepalive_interval));
        self.set_status(ConnectionStatus::Open);
        ClientMetrics::record_opened();
        tracing::info!(url = %self.url, "Connection open");

        loop {
            let step = tokio::select! {
                Ok(()) = self.shutdown.recv() => Step::Shutdown,
                _ = keepalive_tick(&mut self.keepalive) => Step::Keepalive,
                Some(text) = self.outbound.recv() => Step::Outbound(text),
                event = socket.next_event() => Step::Socket(event),
            };

            let outgoing = match step {
                Step::Shutdown => {
                    socket.close().await;
                    return SessionEnd::Shutdown;
                }
                Step::Keepalive => match serde_json::to_string(&ControlFrame::Keepalive) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to encode keepalive frame");
                        continue;
                    }
                },
                Step::Outbound(text) => text,
                Step::Socket(SocketEvent::Message(text)) => {
                    self.dispatch(&text);
                    continue;
                }
                Step::Socket(SocketEvent::Error(e)) => {
                    tracing::warn!(url = %self.url, error = %e, "Socket error, closing");
                    socket.close().await;
                    return SessionEnd::Closed;
                }
                Step::Socket(SocketEvent::Closed) => {
                    tracing::info!(url = %self.url, "Connection closed");
                    return SessionEnd::Closed;
                }
            };

            if let Err(e) = socket.send_text(outgoing).await {
                tracing::warn!(url = %self.url, error = %e, "Send failed, closing");
                socket.close().await;
                return SessionEnd::Closed;
            }
        }
    }

    fn dispatch(&self, text: &str) {
        match serde_json::from_str::<Value>(text) {
            Ok(message) => self.interpreter.notify(message),
            Err(e) => {
                tracing::warn!(url = %self.url, error = %e, "Dropping malformed server frame");
            }
        }
    }

    fn clear_keepalive(&mut self) {
        if self.keepalive.take().is_some() {
            tracing::debug!(url = %self.url, "Keepalive timer cleared");
        }
    }

    /// Commands queued for a socket that is gone are not replayed
    fn drain_outbound(&mut self) {
        let mut dropped = 0usize;
        while self.outbound.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            tracing::debug!(url = %self.url, dropped = dropped, "Discarded unsent commands");
        }
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.status.send_replace(status);
    }
}

/// Live handle to a running [`ConnectionManager`]
pub struct ClientHandle {
    url: String,
    status: watch::Receiver<ConnectionStatus>,
    outbound: mpsc::Sender<String>,
    shutdown: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl ClientHandle {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Receiver that observes every status change, including `Stopped`
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Wait until the manager reports `status`
    pub async fn wait_for_status(&self, status: ConnectionStatus) -> Result<(), ClientError> {
        let mut receiver = self.status.clone();
        receiver
            .wait_for(|current| *current == status)
            .await
            .map(|_| ())
            .map_err(|_| ClientError::Stopped)
    }

    /// Encode `command` and send it over the open connection
    pub fn send<T: Serialize>(&self, command: &T) -> Result<(), ClientError> {
        if self.status() != ConnectionStatus::Open {
            return Err(ClientError::NotConnected);
        }

        let text = serde_json::to_string(command)?;
        self.outbound.try_send(text).map_err(|e| match e {
            TrySendError::Full(_) => ClientError::Transport("outbound buffer full".to_string()),
            TrySendError::Closed(_) => ClientError::Stopped,
        })
    }

    /// Cancel any pending reconnect, close the socket and wait for the task to end
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            tracing::warn!(url = %self.url, error = %e, "Client connection manager task failed");
        }
    }
}
