//! Per-worker request loop with source validation and circuit breaking.
//!
//! A worker owns one fixed target and repeatedly:
//! 1. probes up to [`MAX_SOURCE_ATTEMPTS`] random sources around it, keeping
//!    the first probe that succeeds as the measured request,
//! 2. records every dispatched request in the shared [`ObservationSet`],
//! 3. stops for good once [`FAILURE_THRESHOLD`] failures happen in a row,
//! 4. otherwise sleeps the configured request delay.
//!
//! Probes are load traffic. A successful probe is not repeated, and failed
//! probes are recorded as failed observations like any other request.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::client::{RouteClient, RouteRequest};
use crate::config::RunConfig;
use crate::coordinate::Coordinate;
use crate::generator::CoordinateSampler;
use crate::metrics::ObservationSet;

/// Source coordinates tried per cycle before the cycle is skipped.
pub const MAX_SOURCE_ATTEMPTS: u32 = 3;

/// Consecutive failures after which a worker gives up.
pub const FAILURE_THRESHOLD: u32 = 5;

/// Lifecycle of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Between cycles (or not yet started).
    Idle,
    /// Looking for a source the service can route from.
    Probing,
    /// The last cycle produced a successful measurement.
    Active,
    /// Too many failures in a row; no more requests will be sent.
    CircuitOpen,
    Terminated,
}

/// Why a worker stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerExit {
    /// The run's end time was reached.
    Deadline,
    Cancelled,
    /// The failure threshold was hit.
    CircuitOpen,
}

/// Counts consecutive failures and decides when the circuit opens.
#[derive(Debug, Clone)]
pub struct FailureTracker {
    consecutive: u32,
    threshold: u32,
}

impl FailureTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive: 0,
            threshold,
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive = 0;
    }

    /// Count a failure. Returns true once the circuit is open.
    pub fn record_failure(&mut self) -> bool {
        self.consecutive += 1;
        self.is_open()
    }

    pub fn is_open(&self) -> bool {
        self.consecutive >= self.threshold
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}

/// What a worker reports when it finishes.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerSummary {
    pub worker_id: u32,
    pub target: Coordinate,
    /// Offset of the worker's start from the run start.
    pub started_after: Duration,
    /// Requests dispatched to the routing client.
    pub requests: u64,
    pub successes: u64,
    pub exit: WorkerExit,
}

/// How a single cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleEnd {
    /// A probe succeeded and was recorded.
    Measured,
    /// Every probe failed; nothing more to do this cycle.
    NoRoutableSource,
    /// The run ended or was cancelled mid-cycle.
    Interrupted,
    /// The cycle hit an unexpected error or panic.
    Faulted,
    CircuitOpen,
}

/// One concurrent request loop bound to a fixed target.
pub struct Worker {
    id: u32,
    target: Coordinate,
    config: Arc<RunConfig>,
    client: Arc<dyn RouteClient>,
    observations: Arc<ObservationSet>,
    sampler: CoordinateSampler,
    tracker: FailureTracker,
    state: WorkerState,
    requests: u64,
    successes: u64,
}

impl Worker {
    pub fn new(
        id: u32,
        target: Coordinate,
        config: Arc<RunConfig>,
        client: Arc<dyn RouteClient>,
        observations: Arc<ObservationSet>,
    ) -> Self {
        let sampler = CoordinateSampler::new(config.seed(), u64::from(id));
        Self {
            id,
            target,
            config,
            client,
            observations,
            sampler,
            tracker: FailureTracker::new(FAILURE_THRESHOLD),
            state: WorkerState::Idle,
            requests: 0,
            successes: 0,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Run until `deadline`, cancellation or an open circuit.
    pub async fn run(mut self, run_start: Instant, deadline: Instant, cancel: CancellationToken) -> WorkerSummary {
        let started_after = Instant::now().saturating_duration_since(run_start);
        info!(worker = self.id, target = %self.target, "Worker started");

        let exit = loop {
            if cancel.is_cancelled() {
                break WorkerExit::Cancelled;
            }
            if Instant::now() >= deadline {
                break WorkerExit::Deadline;
            }

            self.state = WorkerState::Probing;
            let cycle = AssertUnwindSafe(self.cycle(deadline, &cancel)).catch_unwind().await;

            let end = match cycle {
                Ok(Ok(end)) => end,
                Ok(Err(e)) => {
                    error!(worker = self.id, error = %e, "Worker cycle failed");
                    self.fault()
                }
                Err(panic) => {
                    error!(worker = self.id, panic = %panic_message(&*panic), "Worker cycle panicked");
                    self.fault()
                }
            };

            match end {
                CycleEnd::CircuitOpen => {
                    self.state = WorkerState::CircuitOpen;
                    warn!(
                        worker = self.id,
                        target = %self.target,
                        failures = self.tracker.consecutive(),
                        "Too many consecutive failures, stopping worker"
                    );
                    break WorkerExit::CircuitOpen;
                }
                CycleEnd::Measured => self.state = WorkerState::Active,
                CycleEnd::NoRoutableSource => {
                    self.state = WorkerState::Idle;
                    debug!(worker = self.id, "No routable source found this cycle");
                }
                CycleEnd::Interrupted | CycleEnd::Faulted => self.state = WorkerState::Idle,
            }

            if self.requests % 10 == 0 && self.requests > 0 {
                debug!(worker = self.id, requests = self.requests, state = ?self.state, "Worker progress");
            }

            if cancel.is_cancelled() {
                break WorkerExit::Cancelled;
            }
            if Instant::now() >= deadline {
                break WorkerExit::Deadline;
            }

            tokio::select! {
                _ = cancel.cancelled() => break WorkerExit::Cancelled,
                _ = tokio::time::sleep(self.config.request_delay()) => {}
            }
        };

        self.state = WorkerState::Terminated;
        info!(
            worker = self.id,
            requests = self.requests,
            successes = self.successes,
            exit = ?exit,
            "Worker completed"
        );

        WorkerSummary {
            worker_id: self.id,
            target: self.target,
            started_after,
            requests: self.requests,
            successes: self.successes,
            exit,
        }
    }

    /// One probe-until-success cycle.
    async fn cycle(&mut self, deadline: Instant, cancel: &CancellationToken) -> anyhow::Result<CycleEnd> {
        let (min_km, max_km) = self.config.source_radius_km();

        for attempt in 1..=MAX_SOURCE_ATTEMPTS {
            if cancel.is_cancelled() || Instant::now() >= deadline {
                return Ok(CycleEnd::Interrupted);
            }

            let source = self.sampler.source(self.target, min_km, max_km);
            let request = RouteRequest::new(self.id, source, self.target);
            // Keep one payload per worker for the report
            let retain_payload = self.successes == 0;

            let outcome = self.client.fetch_route(request, retain_payload, cancel).await?;
            self.requests += 1;
            let success = outcome.success;
            self.observations.record(outcome).await;

            if success {
                self.successes += 1;
                self.tracker.record_success();
                return Ok(CycleEnd::Measured);
            }

            debug!(worker = self.id, attempt, source = %source, "Source probe failed");
            if self.tracker.record_failure() {
                return Ok(CycleEnd::CircuitOpen);
            }
        }

        Ok(CycleEnd::NoRoutableSource)
    }

    fn fault(&mut self) -> CycleEnd {
        if self.tracker.record_failure() {
            CycleEnd::CircuitOpen
        } else {
            CycleEnd::Faulted
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_opens_at_threshold() {
        let mut tracker = FailureTracker::new(FAILURE_THRESHOLD);
        for _ in 0..FAILURE_THRESHOLD - 1 {
            assert!(!tracker.record_failure());
        }
        assert!(tracker.record_failure());
        assert!(tracker.is_open());
    }

    #[test]
    fn test_tracker_resets_on_success() {
        let mut tracker = FailureTracker::new(3);
        tracker.record_failure();
        tracker.record_failure();
        tracker.record_success();
        assert_eq!(tracker.consecutive(), 0);
        assert!(!tracker.record_failure());
        assert!(!tracker.record_failure());
        assert!(tracker.record_failure());
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*payload), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*payload), "bang");
        let payload: Box<dyn std::any::Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(&*payload), "unknown panic");
    }
}
