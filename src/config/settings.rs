use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub websocket: WebSocketConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketConfig {
    /// Route the WebSocket upgrade is served on
    #[serde(default = "default_ws_route")]
    pub route: String,
    /// Frames buffered per connection before sends report `SendFailed`
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Page the client pretends to be loaded from; scheme, host and path feed the socket URL
    #[serde(default = "default_page_url")]
    pub page_url: String,
    /// Appended verbatim to the page path
    #[serde(default = "default_client_route")]
    pub route: String,
    /// Keepalive interval in seconds
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval_secs: u64,
    /// Base reconnect delay in seconds, scaled by the backoff multiplier
    #[serde(default = "default_reconnect_base_delay")]
    pub reconnect_base_delay_secs: u64,
    #[serde(default = "default_max_backoff_multiplier")]
    pub max_backoff_multiplier: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Fallback filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8081
}

fn default_ws_route() -> String {
    "/feed".to_string()
}

fn default_outbound_buffer() -> usize {
    32
}

fn default_page_url() -> String {
    "http://localhost:8081/".to_string()
}

fn default_client_route() -> String {
    "feed".to_string()
}

fn default_keepalive_interval() -> u64 {
    60 // 1 minute
}

fn default_reconnect_base_delay() -> u64 {
    10
}

fn default_max_backoff_multiplier() -> u32 {
    64
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .set_default("websocket.route", default_ws_route())?
            .set_default("websocket.outbound_buffer", default_outbound_buffer() as i64)?
            .set_default("client.page_url", default_page_url())?
            .set_default("client.route", default_client_route())?
            .set_default("client.keepalive_interval_secs", default_keepalive_interval() as i64)?
            .set_default("client.reconnect_base_delay_secs", default_reconnect_base_delay() as i64)?
            .set_default("client.max_backoff_multiplier", default_max_backoff_multiplier() as i64)?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.format", default_log_format())?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // SYNC__SERVER__PORT, SYNC__CLIENT__PAGE_URL, ...
            .add_source(
                Environment::with_prefix("SYNC")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl ClientConfig {
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }

    pub fn reconnect_base_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_base_delay_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            route: default_ws_route(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            page_url: default_page_url(),
            route: default_client_route(),
            keepalive_interval_secs: default_keepalive_interval(),
            reconnect_base_delay_secs: default_reconnect_base_delay(),
            max_backoff_multiplier: default_max_backoff_multiplier(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let settings = Settings::default();
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 8081);
        assert_eq!(settings.server_addr(), "0.0.0.0:8081");
        assert_eq!(settings.websocket.route, "/feed");
    }

    #[test]
    fn test_client_defaults_match_reconnect_policy() {
        let client = ClientConfig::default();
        assert_eq!(client.keepalive_interval(), Duration::from_secs(60));
        assert_eq!(client.reconnect_base_delay(), Duration::from_secs(10));
        assert_eq!(client.max_backoff_multiplier, 64);
    }
}
