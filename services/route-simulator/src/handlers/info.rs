//! Server metadata handler.

use std::sync::Arc;

use axum::{extract::Extension, Json};
use serde::Serialize;

use crate::state::SimulatorState;

#[derive(Serialize)]
pub struct InfoResponse {
    pub version: &'static str,
    pub build_date: &'static str,
    pub features: Features,
    pub supported_vehicles: [&'static str; 4],
    pub data_date: &'static str,
    pub import_date: &'static str,
}

#[derive(Serialize)]
pub struct Features {
    pub routing: bool,
    pub matrix: bool,
    pub isochrone: bool,
    pub map_matching: bool,
}

/// GET /info - Static server metadata
pub async fn info_handler(Extension(state): Extension<Arc<SimulatorState>>) -> Json<InfoResponse> {
    state.delay().await;
    Json(InfoResponse {
        version: "8.0",
        build_date: "2024-01-01T00:00:00Z",
        features: Features {
            routing: true,
            matrix: true,
            isochrone: true,
            map_matching: false,
        },
        supported_vehicles: ["car", "bike", "foot", "motorcycle"],
        data_date: "2024-01-01T00:00:00Z",
        import_date: "2024-01-01T00:00:00Z",
    })
}
