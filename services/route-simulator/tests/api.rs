//! Router-level tests for the simulator endpoints.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use route_simulator::state::SimulatorState;

async fn get(uri: &str) -> (StatusCode, Value) {
    let app = route_simulator::router(Arc::new(SimulatorState::instant()));
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health() {
    let (status, body) = get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_info_lists_vehicles() {
    let (status, body) = get("/info").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], "8.0");
    assert_eq!(body["supported_vehicles"].as_array().unwrap().len(), 4);
    assert_eq!(body["features"]["map_matching"], false);
}

#[tokio::test]
async fn test_route_between_two_points() {
    let (status, body) = get(
        "/route?point=51.5074,-0.1278&point=51.4543,-0.9781&profile=car&instructions=true&calc_points=true",
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let path = &body["paths"][0];
    let distance = path["distance"].as_f64().unwrap();
    assert!((distance - 59_178.0).abs() < 100.0);

    // ~71 minutes at 50 km/h, +-20%
    let time = path["time"].as_u64().unwrap();
    assert!((56_000..=86_000).contains(&(time / 60)), "time {}", time);

    let snapped = path["snapped_waypoints"]["coordinates"].as_array().unwrap();
    assert_eq!(snapped[0][0], -0.1278);
    assert_eq!(snapped[0][1], 51.5074);

    assert_eq!(path["points"]["type"], "LineString");
    assert!(!path["instructions"].as_array().unwrap().is_empty());
    assert_eq!(body["info"]["copyrights"][0], "GraphHopper Simulator");
}

#[tokio::test]
async fn test_route_flags_and_encoded_comma() {
    let (status, body) =
        get("/route?point=51.5074%2C-0.1278&point=51.6,-0.2&instructions=false&calc_points=false").await;
    assert_eq!(status, StatusCode::OK);

    let path = &body["paths"][0];
    assert!(path["points"].is_null());
    assert!(path["instructions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_route_needs_two_points() {
    let (status, body) = get("/route?point=51.5074,-0.1278").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "At least 2 points required");
    assert_eq!(body["hints"][0]["details"], "QueryParam");
}

#[tokio::test]
async fn test_route_rejects_unparseable_points() {
    let (status, body) = get("/route?point=here&point=there").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid coordinates format");
}
