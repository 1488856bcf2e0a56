//! Synthetic route generation.
//!
//! Positions are `[lng, lat]` pairs, the GeoJSON order GraphHopper responds in.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use route_load_test::Coordinate;

/// Average speeds in km/h. Unknown vehicles drive like cars.
pub fn vehicle_speed_kmh(vehicle: &str) -> f64 {
    match vehicle {
        "bike" => 20.0,
        "foot" => 5.0,
        "motorcycle" => 60.0,
        _ => 50.0,
    }
}

/// Parse a `lat,lng` point parameter into a `[lng, lat]` position.
pub fn parse_point(value: &str) -> Option<[f64; 2]> {
    let (lat, lng) = value.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lng: f64 = lng.trim().parse().ok()?;
    if !lat.is_finite() || !lng.is_finite() {
        return None;
    }
    Some([lng, lat])
}

/// Great-circle distance between two positions, in meters.
pub fn distance_m(from: [f64; 2], to: [f64; 2]) -> f64 {
    let a = Coordinate::new(from[1], from[0]);
    let b = Coordinate::new(to[1], to[0]);
    a.distance_km(&b) * 1000.0
}

/// Travel time in milliseconds with up to 20% jitter either way.
pub fn travel_time_ms<R: Rng + ?Sized>(rng: &mut R, distance_m: f64, vehicle: &str) -> u64 {
    let hours = distance_m / 1000.0 / vehicle_speed_kmh(vehicle);
    let base_ms = hours * 3_600_000.0;
    let variation = rng.gen_range(-0.2..=0.2);
    (base_ms * (1.0 + variation)).max(0.0) as u64
}

/// Bounding box `[min_lng, min_lat, max_lng, max_lat]` padded by 0.01 degrees.
pub fn bbox(from: [f64; 2], to: [f64; 2]) -> [f64; 4] {
    [
        from[0].min(to[0]) - 0.01,
        from[1].min(to[1]) - 0.01,
        from[0].max(to[0]) + 0.01,
        from[1].max(to[1]) + 0.01,
    ]
}

#[derive(Debug, Clone, Serialize)]
pub struct LineString {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub coordinates: Vec<[f64; 2]>,
}

impl LineString {
    pub fn new(coordinates: Vec<[f64; 2]>) -> Self {
        Self {
            kind: "LineString",
            coordinates,
        }
    }
}

/// A wiggly line from `from` to `to` with 3 to 7 intermediate points.
pub fn route_points<R: Rng + ?Sized>(rng: &mut R, from: [f64; 2], to: [f64; 2]) -> LineString {
    let intermediate = rng.gen_range(3..=7);
    let mut points = Vec::with_capacity(intermediate + 2);
    points.push(from);

    for i in 0..intermediate {
        let ratio = (i + 1) as f64 / (intermediate + 1) as f64;
        let lng = from[0] + (to[0] - from[0]) * ratio + rng.gen_range(-0.005..0.005);
        let lat = from[1] + (to[1] - from[1]) * ratio + rng.gen_range(-0.005..0.005);
        points.push([lng, lat]);
    }

    points.push(to);
    LineString::new(points)
}

#[derive(Debug, Clone, Serialize)]
pub struct Instruction {
    pub distance: f64,
    pub heading: f64,
    pub sign: i32,
    pub interval: [usize; 2],
    pub text: &'static str,
    pub time: u64,
}

const TURNS: [&str; 5] = ["Turn left", "Turn right", "Continue straight", "Keep right", "Keep left"];
const TURN_SIGNS: [i32; 7] = [-3, -2, -1, 0, 1, 2, 3];
/// GraphHopper's sign for "arrive".
const SIGN_FINISH: i32 = 4;

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Turn-by-turn instructions: a departure, 2 to 5 turns and an arrival.
pub fn instructions<R: Rng + ?Sized>(rng: &mut R, distance_m: f64) -> Vec<Instruction> {
    let turns = rng.gen_range(2..=5);
    let mut out = Vec::with_capacity(turns + 2);

    out.push(Instruction {
        distance: round1(distance_m * 0.1),
        heading: rng.gen_range(0.0..360.0),
        sign: 0,
        interval: [0, 1],
        text: "Head north",
        time: rng.gen_range(1000..5000),
    });

    for i in 0..turns {
        out.push(Instruction {
            distance: round1(distance_m * rng.gen_range(0.0..0.3)),
            heading: rng.gen_range(0.0..360.0),
            sign: *TURN_SIGNS.choose(rng).unwrap_or(&0),
            interval: [i + 1, i + 2],
            text: TURNS.choose(rng).copied().unwrap_or("Continue straight"),
            time: rng.gen_range(500..3000),
        });
    }

    let n = out.len();
    out.push(Instruction {
        distance: 0.0,
        heading: rng.gen_range(0.0..360.0),
        sign: SIGN_FINISH,
        interval: [n, n + 1],
        text: "Arrive at destination",
        time: 0,
    });

    out
}
