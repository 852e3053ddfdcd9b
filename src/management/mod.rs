//! Gateway-local management endpoints.
//!
//! Served by the gateway itself, ahead of the route table, so they answer
//! even when no upstream is reachable.

pub mod handlers;

use axum::{routing::get, Router};

use self::handlers::{get_health, get_info};
use crate::http::server::AppState;

pub const HEALTH_PATH: &str = "/actuator/health";
pub const INFO_PATH: &str = "/actuator/info";

pub fn setup_management_router() -> Router<AppState> {
    Router::new()
        .route(HEALTH_PATH, get(get_health))
        .route(INFO_PATH, get(get_info))
}
