//! Administrative endpoints served by the gateway itself.

pub mod handlers;

use axum::{routing::get, Router};

use self::handlers::get_health;

/// Router answering the health check on `health_path`.
pub fn health_router<S>(health_path: &str) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(health_path, get(get_health))
}
