//! Random source/target coordinate generation.

use rand::prelude::*;
use std::f64::consts::PI;

use crate::coordinate::Coordinate;

/// Flat-earth approximation used to turn kilometers into degrees.
pub const KM_PER_DEGREE: f64 = 111.0;

/// Pick a point uniformly (by area) inside the disk of `radius_km` around `center`.
pub fn sample_within_radius<R: Rng + ?Sized>(rng: &mut R, center: Coordinate, radius_km: f64) -> Coordinate {
    let angle = rng.gen::<f64>() * 2.0 * PI;
    // sqrt keeps the density uniform by area instead of clustering at the center
    let distance_km = rng.gen::<f64>().sqrt() * radius_km;
    project(center, angle, distance_km)
}

/// Pick a point whose distance from `target` falls in `[min_km, max_km)`.
///
/// The radius is drawn linearly, not by area. The band is narrow compared to
/// its radius so the bias toward the inner edge stays small.
pub fn sample_in_annulus<R: Rng + ?Sized>(
    rng: &mut R,
    target: Coordinate,
    min_km: f64,
    max_km: f64,
) -> Coordinate {
    let distance_km = rng.gen::<f64>() * (max_km - min_km) + min_km;
    let angle = rng.gen::<f64>() * 2.0 * PI;
    project(target, angle, distance_km)
}

/// Move `distance_km` from `origin` along `angle` (radians, 0 = north).
fn project(origin: Coordinate, angle: f64, distance_km: f64) -> Coordinate {
    let distance_deg = distance_km / KM_PER_DEGREE;

    let d_lat = distance_deg * angle.cos();
    // Meridians converge away from the equator
    let d_lng = distance_deg * angle.sin() / origin.latitude().to_radians().cos();

    Coordinate::new(origin.latitude() + d_lat, origin.longitude() + d_lng)
}

/// Stateful coordinate generator owning its random source.
pub struct CoordinateSampler {
    rng: StdRng,
}

impl CoordinateSampler {
    /// Create a sampler.
    ///
    /// With a seed, each `stream` gets its own reproducible sequence so workers
    /// don't share draws; without one the generator is seeded from entropy.
    pub fn new(seed: Option<u64>, stream: u64) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(stream.wrapping_mul(0x9E37_79B9_7F4A_7C15))),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    /// Target coordinate for a new worker.
    pub fn target(&mut self, center: Coordinate, radius_km: f64) -> Coordinate {
        sample_within_radius(&mut self.rng, center, radius_km)
    }

    /// Source coordinate for a request toward `target`.
    pub fn source(&mut self, target: Coordinate, min_km: f64, max_km: f64) -> Coordinate {
        sample_in_annulus(&mut self.rng, target, min_km, max_km)
    }
}
