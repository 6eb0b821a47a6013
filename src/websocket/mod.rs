mod connection;
mod handler;
mod socket;

pub use connection::{log_view_command, ConnectionState, SyncConnection, SyncHandler, ViewListener};
pub use handler::{handle_socket, ws_handler};
pub use socket::{ChannelSocket, SendError, SyncSocket};
