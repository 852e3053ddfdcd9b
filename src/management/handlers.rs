use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct RouteSummary {
    pub id: String,
    pub paths: Vec<String>,
    pub uri: String,
    pub filters: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct GatewayInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub routes: Vec<RouteSummary>,
}

pub async fn get_health() -> Json<HealthStatus> {
    Json(HealthStatus { status: "UP" })
}

pub async fn get_info(State(state): State<AppState>) -> Json<GatewayInfo> {
    let routes = state
        .dispatcher
        .routes()
        .routes()
        .iter()
        .map(|route| RouteSummary {
            id: route.id.clone(),
            paths: route.matcher.patterns().iter().map(ToString::to_string).collect(),
            uri: route.upstream.to_string(),
            filters: route.chain.kinds().iter().map(ToString::to_string).collect(),
        })
        .collect();

    Json(GatewayInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        routes,
    })
}
