//! Configuration loading and management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::coordinate::Coordinate;
use crate::error::ConfigError;

/// Output file name that gets a timestamp suffix at run time.
pub const DEFAULT_OUTPUT: &str = "load-test-results.html";

/// Raw run settings, loaded from a YAML scenario and/or CLI flags.
///
/// Nothing here is trusted until [`RunSettings::validate`] turns it into a
/// [`RunConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub url: String,
    pub center: String,
    pub duration_minutes: f64,
    pub start_interval_minutes: f64,
    pub request_delay_ms: u64,
    pub target_radius_km: f64,
    pub source_radius_min_km: f64,
    pub source_radius_max_km: f64,
    pub output: PathBuf,
    pub include_instructions: bool,
    pub name: Option<String>,
    /// Free text shown by `route-load-test list`.
    pub description: Option<String>,
    pub validate_center: bool,
    pub seed: Option<u64>, // Optional RNG seed for reproducible tests
    pub request_timeout_secs: u64,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:8989".to_string(),
            center: "51.5074,-0.1278".to_string(), // London
            duration_minutes: 10.0,
            start_interval_minutes: 1.0,
            request_delay_ms: 1000,
            target_radius_km: 5.0,
            source_radius_min_km: 40.0,
            source_radius_max_km: 50.0,
            output: PathBuf::from(DEFAULT_OUTPUT),
            include_instructions: true,
            name: None,
            description: None,
            validate_center: true,
            seed: None,
            request_timeout_secs: 30,
        }
    }
}

impl RunSettings {
    /// Load settings from a YAML scenario file. Missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: RunSettings = serde_yaml::from_str(&content)?;
        Ok(settings)
    }

    /// Validate and freeze into a [`RunConfig`].
    pub fn validate(self) -> Result<RunConfig, ConfigError> {
        let center: Coordinate = self.center.parse()?;

        if !(self.duration_minutes.is_finite() && self.duration_minutes > 0.0) {
            return Err(ConfigError::NonPositiveDuration(self.duration_minutes));
        }
        if !(self.start_interval_minutes.is_finite() && self.start_interval_minutes > 0.0) {
            return Err(ConfigError::NonPositiveInterval(self.start_interval_minutes));
        }
        if !(self.target_radius_km.is_finite() && self.target_radius_km >= 0.0) {
            return Err(ConfigError::InvalidTargetRadius(self.target_radius_km));
        }

        let (min, max) = (self.source_radius_min_km, self.source_radius_max_km);
        if !(min.is_finite() && max.is_finite() && min >= 0.0 && min < max) {
            return Err(ConfigError::InvalidSourceBand { min, max });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        let base_url = normalize_url(&self.url)?;
        let duration = minutes("duration", self.duration_minutes)?;
        if duration.is_zero() {
            return Err(ConfigError::NonPositiveDuration(self.duration_minutes));
        }
        let start_interval = minutes("start interval", self.start_interval_minutes)?;
        if start_interval.is_zero() {
            return Err(ConfigError::NonPositiveInterval(self.start_interval_minutes));
        }

        Ok(RunConfig {
            base_url,
            center,
            duration,
            start_interval,
            request_delay: Duration::from_millis(self.request_delay_ms),
            target_radius_km: self.target_radius_km,
            source_radius_min_km: min,
            source_radius_max_km: max,
            output_path: self.output,
            include_instructions: self.include_instructions,
            name: self.name.filter(|n| !n.trim().is_empty()),
            validate_center: self.validate_center,
            seed: self.seed,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        })
    }
}

/// Longest duration or start interval a run accepts: one year.
pub const MAX_MINUTES: f64 = 365.0 * 24.0 * 60.0;

/// Convert positive minutes to a [`Duration`], capped at [`MAX_MINUTES`].
fn minutes(field: &'static str, m: f64) -> Result<Duration, ConfigError> {
    let too_large = || ConfigError::DurationTooLarge {
        field,
        minutes: m,
        max: MAX_MINUTES,
    };
    if m > MAX_MINUTES {
        return Err(too_large());
    }
    Duration::try_from_secs_f64(m * 60.0).map_err(|_| too_large())
}

/// Check the URL is absolute http(s) and strip trailing slashes.
fn normalize_url(url: &str) -> Result<String, ConfigError> {
    let parsed = reqwest::Url::parse(url).map_err(|e| ConfigError::invalid_url(url, e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::invalid_url(url, "scheme must be http or https"));
    }
    Ok(url.trim_end_matches('/').to_string())
}

/// Validated, immutable configuration for one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
    base_url: String,
    center: Coordinate,
    duration: Duration,
    start_interval: Duration,
    request_delay: Duration,
    target_radius_km: f64,
    source_radius_min_km: f64,
    source_radius_max_km: f64,
    output_path: PathBuf,
    include_instructions: bool,
    name: Option<String>,
    validate_center: bool,
    seed: Option<u64>,
    request_timeout: Duration,
}

impl RunConfig {
    /// Routing server base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn center(&self) -> Coordinate {
        self.center
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Delay between consecutive worker starts.
    pub fn start_interval(&self) -> Duration {
        self.start_interval
    }

    /// Pause between two cycles of the same worker.
    pub fn request_delay(&self) -> Duration {
        self.request_delay
    }

    pub fn target_radius_km(&self) -> f64 {
        self.target_radius_km
    }

    /// Source band `(min, max)` in kilometers; `min < max` always holds.
    pub fn source_radius_km(&self) -> (f64, f64) {
        (self.source_radius_min_km, self.source_radius_max_km)
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn include_instructions(&self) -> bool {
        self.include_instructions
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn validate_center(&self) -> bool {
        self.validate_center
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Replace the default output name with a timestamped one.
    ///
    /// Explicit names chosen by the user are kept as-is.
    pub fn with_timestamped_output(mut self, now: chrono::DateTime<chrono::Local>) -> Self {
        if self.output_path == Path::new(DEFAULT_OUTPUT) {
            self.output_path = PathBuf::from(format!(
                "load-test-results_{}.html",
                now.format("%Y-%m-%d_%H-%M-%S")
            ));
        }
        self
    }
}
