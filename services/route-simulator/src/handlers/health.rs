//! Health handler.

use std::sync::Arc;

use axum::{extract::Extension, Json};
use serde::Serialize;

use crate::state::SimulatorState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// GET /health - Basic health check
pub async fn health_handler(Extension(state): Extension<Arc<SimulatorState>>) -> Json<HealthResponse> {
    state.delay().await;
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
