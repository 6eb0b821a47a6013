mod settings;

pub use settings::{ClientConfig, LoggingConfig, ServerConfig, Settings, WebSocketConfig};
