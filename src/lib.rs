// Infrastructure
pub mod config;
pub mod error;
pub mod logger;
pub mod metrics;

// Domain collaborators
pub mod model;

// Synchronization core
pub mod client;
pub mod websocket;

// Application layer
pub mod api;
pub mod server;

// Supporting modules
pub mod shutdown;
pub mod telemetry;
