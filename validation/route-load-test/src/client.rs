//! Routing service client: one request in, one classified outcome out.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::RunConfig;
use crate::coordinate::Coordinate;

/// A single route request attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteRequest {
    pub source: Coordinate,
    pub target: Coordinate,
    pub issued_at: DateTime<Utc>,
    pub worker_id: u32,
}

impl RouteRequest {
    /// Build a request stamped with the current time.
    pub fn new(worker_id: u32, source: Coordinate, target: Coordinate) -> Self {
        Self {
            source,
            target,
            issued_at: Utc::now(),
            worker_id,
        }
    }
}

/// Classified result of one request that reached the routing service.
#[derive(Debug, Clone, Serialize)]
pub struct RouteOutcome {
    pub request: RouteRequest,
    #[serde(serialize_with = "serialize_ms")]
    pub latency: Duration,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    pub completed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_payload: Option<String>,
}

impl RouteOutcome {
    pub fn success(request: RouteRequest, latency: Duration, raw_payload: Option<String>) -> Self {
        Self {
            request,
            latency,
            success: true,
            error_detail: None,
            completed_at: Utc::now(),
            raw_payload,
        }
    }

    pub fn failure(request: RouteRequest, latency: Duration, detail: impl Into<String>) -> Self {
        Self {
            request,
            latency,
            success: false,
            error_detail: Some(detail.into()),
            completed_at: Utc::now(),
            raw_payload: None,
        }
    }

    /// Latency in milliseconds.
    pub fn latency_ms(&self) -> f64 {
        self.latency.as_nanos() as f64 / 1_000_000.0
    }
}

fn serialize_ms<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_nanos() as f64 / 1_000_000.0)
}

/// Anything that can answer route requests.
///
/// `fetch_route` never retries; retry policy belongs to the caller. It returns
/// `Err` only when the request could not be dispatched at all. Every request
/// that reaches the service comes back as `Ok`, successful or not.
#[async_trait]
pub trait RouteClient: Send + Sync {
    /// Issue one route request and classify the result.
    async fn fetch_route(
        &self,
        request: RouteRequest,
        retain_payload: bool,
        cancel: &CancellationToken,
    ) -> Result<RouteOutcome>;

    /// Connectivity probe.
    async fn health(&self) -> Result<()>;
}

/// Timeout for the `/health` probe.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// [`RouteClient`] speaking the GraphHopper `/route` HTTP API.
#[derive(Clone)]
pub struct HttpRouteClient {
    client: reqwest::Client,
    base_url: String,
    include_instructions: bool,
}

impl HttpRouteClient {
    /// Create a client for the server described by `config`.
    pub fn new(config: &RunConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url().trim_end_matches('/').to_string(),
            include_instructions: config.include_instructions(),
        })
    }

    /// Build a `/route` URL for a source/target pair.
    pub fn route_url(&self, source: Coordinate, target: Coordinate) -> String {
        format!(
            "{}/route?point={}&point={}&profile=car&instructions={}&calc_points=true&points_encoded=false",
            self.base_url, source, target, self.include_instructions
        )
    }
}

#[async_trait]
impl RouteClient for HttpRouteClient {
    async fn fetch_route(
        &self,
        request: RouteRequest,
        retain_payload: bool,
        cancel: &CancellationToken,
    ) -> Result<RouteOutcome> {
        let url = self.route_url(request.source, request.target);
        let url = reqwest::Url::parse(&url).with_context(|| format!("invalid route url: {}", url))?;

        debug!(
            worker = request.worker_id,
            source = %request.source,
            target = %request.target,
            "Requesting route"
        );

        let start = Instant::now();
        let exchange = async {
            let response = self.client.get(url).send().await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        let result = tokio::select! {
            result = exchange => Some(result),
            _ = cancel.cancelled() => None,
        };
        let latency = start.elapsed();

        let outcome = match result {
            None => RouteOutcome::failure(request, latency, "request cancelled"),
            Some(Err(e)) => RouteOutcome::failure(request, latency, e.to_string()),
            Some(Ok((status, body))) if !status.is_success() => {
                RouteOutcome::failure(request, latency, format!("HTTP {}: {}", status.as_u16(), body))
            }
            // The geometry itself is never inspected, only that the body is JSON.
            Some(Ok((_, body))) => match serde_json::from_str::<serde::de::IgnoredAny>(&body) {
                Ok(_) => RouteOutcome::success(request, latency, retain_payload.then_some(body)),
                Err(e) => RouteOutcome::failure(request, latency, format!("invalid JSON response: {}", e)),
            },
        };

        if let Some(ref err) = outcome.error_detail {
            warn!(worker = outcome.request.worker_id, error = %err, "Route request failed");
        }

        Ok(outcome)
    }

    async fn health(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).timeout(HEALTH_TIMEOUT).send().await?;

        if !response.status().is_success() {
            bail!("health check failed: HTTP {}", response.status());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunSettings;

    fn client(instructions: bool) -> HttpRouteClient {
        let settings = RunSettings {
            url: "http://localhost:8989/".to_string(),
            include_instructions: instructions,
            ..Default::default()
        };
        HttpRouteClient::new(&settings.validate().unwrap()).unwrap()
    }

    #[test]
    fn test_route_url_encodes_points_in_order() {
        let source = Coordinate::new(51.9, -0.5);
        let target = Coordinate::new(51.5074, -0.1278);

        let url = client(true).route_url(source, target);
        assert_eq!(
            url,
            "http://localhost:8989/route?point=51.900000,-0.500000&point=51.507400,-0.127800\
             &profile=car&instructions=true&calc_points=true&points_encoded=false"
        );

        let url = client(false).route_url(source, target);
        assert!(url.contains("&instructions=false&"));
    }

    #[test]
    fn test_outcome_latency_ms() {
        let req = RouteRequest::new(1, Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 1.0));
        let outcome = RouteOutcome::success(req, Duration::from_millis(50), None);
        assert_eq!(outcome.latency_ms(), 50.0);
        assert!(outcome.error_detail.is_none());
    }
}
