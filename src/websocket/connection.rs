//! Per-connection bridge between a model and a socket.
//!
//! [`SyncHandler`] holds the collaborators shared by every connection on a
//! route. [`SyncHandler::accept`] registers a change callback with the model
//! and returns the [`SyncConnection`] that owns the registration. The
//! registration is released only when a send reports [`SendError::SocketClosed`].

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::logger::{SyncLogger, TracingLogger};
use crate::metrics::SyncMetrics;
use crate::model::{ListenerId, ModelListener};

use super::socket::{SendError, SyncSocket};

/// Sink for commands decoded from client frames
pub type ViewListener = Arc<dyn Fn(Value) + Send + Sync>;

/// Default view listener: logs each command and drops it
pub fn log_view_command(command: Value) {
    tracing::info!(command = %command, "View command received");
}

/// Shared configuration for all connections accepted on one route
pub struct SyncHandler {
    route: String,
    model: Arc<dyn ModelListener>,
    view: Option<ViewListener>,
    logger: Arc<dyn SyncLogger>,
}

impl SyncHandler {
    pub fn new(route: impl Into<String>, model: Arc<dyn ModelListener>) -> Self {
        Self {
            route: route.into(),
            model,
            view: None,
            logger: Arc::new(TracingLogger),
        }
    }

    pub fn with_view_listener(mut self, view: ViewListener) -> Self {
        self.view = Some(view);
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn SyncLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    /// Bind a freshly accepted socket to the model.
    pub fn accept(&self, socket: Arc<dyn SyncSocket>) -> Arc<SyncConnection> {
        let connection = Arc::new(SyncConnection {
            id: Uuid::new_v4(),
            connected_at: Utc::now(),
            socket,
            model: self.model.clone(),
            view: self.view.clone(),
            logger: self.logger.clone(),
            registration: Mutex::new(Registration::Pending),
        });

        // The model keeps the connection alive until the registration is released
        let target = connection.clone();
        let id = self
            .model
            .register_listener(Arc::new(move |change: &Value| target.handle_change(change)));
        connection.activate(id);

        SyncMetrics::record_accepted();
        tracing::info!(
            connection_id = %connection.id,
            listener_id = %id,
            route = %self.route,
            "WebSocket connection accepted"
        );

        connection
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Registration {
    /// `register_listener` has not returned yet
    Pending,
    Active(ListenerId),
    Released,
}

/// Connection lifecycle as seen by the handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    Closed,
}

/// One accepted socket and its model registration
pub struct SyncConnection {
    id: Uuid,
    connected_at: DateTime<Utc>,
    socket: Arc<dyn SyncSocket>,
    model: Arc<dyn ModelListener>,
    view: Option<ViewListener>,
    logger: Arc<dyn SyncLogger>,
    registration: Mutex<Registration>,
}

impl SyncConnection {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn state(&self) -> ConnectionState {
        match *self.registration() {
            Registration::Released => ConnectionState::Closed,
            Registration::Pending | Registration::Active(_) => ConnectionState::Open,
        }
    }

    /// Forward one model change to the client
    pub fn handle_change(&self, change: &Value) {
        if self.state() == ConnectionState::Closed {
            return;
        }

        self.logger.info("model change: sending to client");
        let payload = change.to_string();
        self.logger.debug(&payload);

        match self.socket.send(payload) {
            Ok(()) => SyncMetrics::record_change_sent(),
            Err(err @ SendError::SocketClosed) => {
                SyncMetrics::record_socket_closed();
                self.logger.info(&err.to_string());
                self.socket.close();
                self.release();
            }
            Err(err @ SendError::SendFailed(_)) => {
                SyncMetrics::record_send_failed();
                self.logger.error(&err.to_string());
            }
        }
    }

    /// Relay one client frame to the view listener
    pub fn handle_message(&self, text: &str) {
        self.logger.info("received view command");
        self.logger.debug(text);
        SyncMetrics::record_view_command();

        let command: Value = match serde_json::from_str(text) {
            Ok(command) => command,
            Err(e) => {
                self.logger.error(&format!("invalid view command: {}", e));
                return;
            }
        };

        if let Some(view) = &self.view {
            view(command);
        }
    }

    fn activate(&self, id: ListenerId) {
        let mut registration = self.registration();
        match *registration {
            Registration::Pending => {
                *registration = Registration::Active(id);
                SyncMetrics::record_registered();
            }
            // A send already failed while registering; give the id straight back
            Registration::Released => {
                drop(registration);
                self.model.unregister_listener(id);
            }
            Registration::Active(_) => {}
        }
    }

    fn release(&self) {
        let previous = std::mem::replace(&mut *self.registration(), Registration::Released);

        if let Registration::Active(id) = previous {
            self.model.unregister_listener(id);
            SyncMetrics::record_released();
            tracing::info!(
                connection_id = %self.id,
                listener_id = %id,
                "Model listener released"
            );
        }
    }

    fn registration(&self) -> MutexGuard<'_, Registration> {
        self.registration
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
