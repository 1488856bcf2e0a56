//! Error types for run configuration.

use std::path::PathBuf;

use thiserror::Error;

/// Errors detected while building a [`RunConfig`](crate::config::RunConfig).
///
/// All of these are raised before the run starts; a run never begins with an
/// invalid configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The center point could not be parsed as `latitude,longitude`.
    #[error("invalid center point '{0}': use latitude,longitude (e.g. 51.5074,-0.1278)")]
    InvalidCenter(String),

    /// Test duration was zero, negative or not a number.
    #[error("duration must be greater than 0 (got {0} minutes)")]
    NonPositiveDuration(f64),

    /// Worker start interval was zero, negative or not a number.
    #[error("worker start interval must be greater than 0 (got {0} minutes)")]
    NonPositiveInterval(f64),

    /// Duration or interval is longer than a run may last.
    #[error("{field} must be at most {max} minutes (got {minutes})")]
    DurationTooLarge { field: &'static str, minutes: f64, max: f64 },

    /// Target radius was negative or not a number.
    #[error("target radius must be a non-negative number of kilometers (got {0})")]
    InvalidTargetRadius(f64),

    /// Source radius band is inverted, empty or negative.
    #[error("source radius minimum ({min} km) must be non-negative and less than maximum ({max} km)")]
    InvalidSourceBand { min: f64, max: f64 },

    /// Request timeout must allow at least some time for a call.
    #[error("request timeout must be greater than 0")]
    ZeroTimeout,

    /// The routing server URL is not an absolute http(s) URL.
    #[error("invalid server url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Scenario file could not be read.
    #[error("failed to read scenario {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Scenario file is not valid YAML for [`RunSettings`](crate::config::RunSettings).
    #[error("failed to parse scenario: {0}")]
    Parse(#[from] serde_yaml::Error),
}

impl ConfigError {
    /// Create an InvalidUrl error.
    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }
}
