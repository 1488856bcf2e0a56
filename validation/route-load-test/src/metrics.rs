//! Observation collection and statistics.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hdrhistogram::Histogram;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::client::RouteOutcome;
use crate::worker::WorkerSummary;

/// Append-only sink shared by all workers of a run.
#[derive(Default)]
pub struct ObservationSet {
    outcomes: Mutex<Vec<RouteOutcome>>,
}

impl ObservationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one outcome.
    pub async fn record(&self, outcome: RouteOutcome) {
        self.outcomes.lock().await.push(outcome);
    }

    /// Number of outcomes recorded so far.
    pub async fn len(&self) -> usize {
        self.outcomes.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Take everything recorded. Call once all writers have finished.
    pub async fn drain(&self) -> Vec<RouteOutcome> {
        std::mem::take(&mut *self.outcomes.lock().await)
    }
}

/// Final statistics of a run.
#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// Percentage in `[0, 100]`, 0 when nothing was recorded.
    pub success_rate: f64,

    // Latency of successful requests (ms)
    pub mean_latency_ms: f64,
    pub min_latency_ms: f64,
    pub max_latency_ms: f64,
    pub std_dev_ms: f64,
    pub latency_p50_ms: f64,
    pub latency_p90_ms: f64,
    pub latency_p95_ms: f64,
    pub latency_p99_ms: f64,

    /// Every outcome, ordered by request time.
    pub outcomes: Vec<RouteOutcome>,
    /// First successful outcome of each worker, keyed by worker id.
    pub first_success_per_worker: BTreeMap<u32, RouteOutcome>,
    pub workers: Vec<WorkerSummary>,
}

impl Statistics {
    /// Reduce a finished run's outcomes into summary statistics.
    pub fn from_outcomes(
        mut outcomes: Vec<RouteOutcome>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        mut workers: Vec<WorkerSummary>,
    ) -> Self {
        outcomes.sort_by(|a, b| {
            a.request
                .issued_at
                .cmp(&b.request.issued_at)
                .then(a.request.worker_id.cmp(&b.request.worker_id))
        });
        workers.sort_by_key(|w| w.worker_id);

        let total = outcomes.len() as u64;
        let latencies: Vec<f64> = outcomes
            .iter()
            .filter(|o| o.success)
            .map(RouteOutcome::latency_ms)
            .collect();
        let successful = latencies.len() as u64;

        let success_rate = if total > 0 {
            (successful as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        let summary = LatencySummary::from_ms(&latencies);
        let percentiles = Percentiles::from_outcomes(&outcomes);

        let mut first_success_per_worker = BTreeMap::new();
        for outcome in outcomes.iter().filter(|o| o.success) {
            first_success_per_worker
                .entry(outcome.request.worker_id)
                .or_insert_with(|| outcome.clone());
        }

        Self {
            started_at,
            finished_at,
            total_requests: total,
            successful_requests: successful,
            failed_requests: total - successful,
            success_rate,
            mean_latency_ms: summary.mean,
            min_latency_ms: summary.min,
            max_latency_ms: summary.max,
            std_dev_ms: summary.std_dev,
            latency_p50_ms: percentiles.p50,
            latency_p90_ms: percentiles.p90,
            latency_p95_ms: percentiles.p95,
            latency_p99_ms: percentiles.p99,
            outcomes,
            first_success_per_worker,
            workers,
        }
    }

    /// Wall-clock length of the run.
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

#[derive(Debug, Default, PartialEq)]
struct LatencySummary {
    mean: f64,
    min: f64,
    max: f64,
    std_dev: f64,
}

impl LatencySummary {
    /// Mean, extrema and population standard deviation; all zero when empty.
    fn from_ms(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        Self {
            mean,
            min,
            max,
            std_dev: variance.sqrt(),
        }
    }
}

#[derive(Debug, Default)]
struct Percentiles {
    p50: f64,
    p90: f64,
    p95: f64,
    p99: f64,
}

impl Percentiles {
    fn from_outcomes(outcomes: &[RouteOutcome]) -> Self {
        let Ok(mut histogram) = Histogram::<u64>::new(3) else {
            return Self::default();
        };
        for outcome in outcomes.iter().filter(|o| o.success) {
            histogram.record(outcome.latency.as_micros() as u64).ok();
        }
        if histogram.len() == 0 {
            return Self::default();
        }

        let at = |q: f64| histogram.value_at_percentile(q) as f64 / 1000.0;
        Self {
            p50: at(50.0),
            p90: at(90.0),
            p95: at(95.0),
            p99: at(99.0),
        }
    }
}
