//! API layer - HTTP endpoint handlers.

mod changes;
mod health;
mod metrics;
mod routes;

pub use changes::{publish_change, PublishChangeResponse};
pub use health::{health, HealthResponse};
pub use metrics::prometheus_metrics;
pub use routes::{api_routes, MAX_CHANGE_BODY_BYTES};
