//! Client side of model synchronization.
//!
//! [`ConnectionManager::spawn`] opens a WebSocket to `route` under a
//! [`PageLocation`], forwards every decoded message to an [`Interpreter`] and
//! reconnects with doubling delays (10 s, 20 s, ... capped at 640 s) whenever
//! the socket closes, errors or is refused.

mod backoff;
mod interpreter;
mod location;
mod manager;
mod transport;

pub use backoff::{BackoffConfig, ReconnectBackoff};
pub use interpreter::Interpreter;
pub use location::PageLocation;
pub use manager::{
    ClientHandle, ClientOptions, ConnectionManager, ConnectionStatus, DEFAULT_KEEPALIVE_INTERVAL,
};
pub use transport::{ClientSocket, ClientTransport, SocketEvent, TungsteniteTransport};
