//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
    pub event_bus: String,
    pub job_queue: String,
}

fn running(closed: bool) -> String {
    if closed { "stopped" } else { "running" }.to_string()
}

/// Health check endpoint handler
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    // Check database connectivity
    let database_ok = sqlx::query("SELECT 1").execute(&state.db).await.is_ok();
    let background_ok = !state.events.is_closed() && !state.jobs.is_closed();

    Json(HealthResponse {
        status: if database_ok && background_ok { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if database_ok { "connected" } else { "disconnected" }.to_string(),
        event_bus: running(state.events.is_closed()),
        job_queue: running(state.jobs.is_closed()),
    })
}
