//! GraphHopper-style `/route` handler.

use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rand::Rng;
use serde::Serialize;
use tracing::debug;

use crate::state::SimulatorState;
use crate::synth::{self, Instruction, LineString};

#[derive(Serialize)]
pub struct RouteResponse {
    pub paths: Vec<RoutePath>,
    pub info: ResponseInfo,
}

#[derive(Serialize)]
pub struct RoutePath {
    /// Meters.
    pub distance: f64,
    pub weight: f64,
    /// Milliseconds.
    pub time: u64,
    pub transfers: u32,
    pub points_encoded: bool,
    pub bbox: [f64; 4],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<LineString>,
    pub instructions: Vec<Instruction>,
    pub ascend: f64,
    pub descend: f64,
    pub snapped_waypoints: LineString,
}

#[derive(Serialize)]
pub struct ResponseInfo {
    pub copyrights: Vec<&'static str>,
    pub took: u64,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub message: String,
    pub hints: Vec<Hint>,
}

#[derive(Serialize)]
pub struct Hint {
    pub message: String,
    pub details: &'static str,
}

fn bad_request(message: &str) -> Response {
    let body = ErrorResponse {
        message: message.to_string(),
        hints: vec![Hint {
            message: message.to_string(),
            details: "QueryParam",
        }],
    };
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

/// Boolean query flag; anything but a case-insensitive "true" is false.
fn flag(params: &[(String, String)], name: &str, default: bool) -> bool {
    params
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
}

/// GET /route?point=lat,lng&point=lat,lng[&vehicle=..][&instructions=..][&calc_points=..]
pub async fn route_handler(
    Extension(state): Extension<Arc<SimulatorState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    state.delay().await;

    let raw_points: Vec<&str> = params
        .iter()
        .filter(|(k, _)| k == "point")
        .map(|(_, v)| v.as_str())
        .collect();
    if raw_points.len() < 2 {
        return bad_request("At least 2 points required");
    }

    let points: Vec<[f64; 2]> = raw_points.iter().filter_map(|p| synth::parse_point(p)).collect();
    if points.len() < 2 {
        return bad_request("Invalid coordinates format");
    }

    let vehicle = param(&params, "vehicle")
        .or_else(|| param(&params, "profile"))
        .unwrap_or("car");
    let with_instructions = flag(&params, "instructions", true);
    let calc_points = flag(&params, "calc_points", true);

    let (from, to) = (points[0], points[1]);
    let distance = synth::distance_m(from, to);

    let mut rng = rand::thread_rng();
    let time = synth::travel_time_ms(&mut rng, distance, vehicle);
    debug!(vehicle, distance_m = distance, time_ms = time, "Simulated route");

    let path = RoutePath {
        distance: (distance * 10.0).round() / 10.0,
        weight: time as f64 / 1000.0,
        time,
        transfers: 0,
        points_encoded: false,
        bbox: synth::bbox(from, to),
        points: calc_points.then(|| synth::route_points(&mut rng, from, to)),
        instructions: if with_instructions {
            synth::instructions(&mut rng, distance)
        } else {
            Vec::new()
        },
        ascend: rng.gen_range(0.0..100.0),
        descend: rng.gen_range(0.0..100.0),
        snapped_waypoints: LineString::new(vec![from, to]),
    };

    let response = RouteResponse {
        paths: vec![path],
        info: ResponseInfo {
            copyrights: vec!["GraphHopper Simulator"],
            took: rng.gen_range(5..50),
        },
    };

    Json(response).into_response()
}
