//! Route Simulator Library
//!
//! A stand-in for a GraphHopper server: answers `/route` with plausible
//! synthetic routes after a random delay, so the load tester can be run
//! without real map data.

pub mod handlers;
pub mod state;
pub mod synth;

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::SimulatorState;

/// Build the simulator's router.
pub fn router(state: Arc<SimulatorState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_handler))
        .route("/route", get(handlers::route::route_handler))
        .route("/info", get(handlers::info::info_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
