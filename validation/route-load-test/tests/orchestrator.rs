//! Scheduler and worker behavior on a paused clock, driven by stub clients.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use route_load_test::{
    preflight, Coordinate, LoadRunner, ObservationSet, RouteClient, RouteOutcome, RouteRequest, RunConfig,
    RunPhase, RunSettings, Worker, WorkerExit, FAILURE_THRESHOLD,
};

#[derive(Clone, Copy)]
enum Behavior {
    Succeed,
    Fail,
    /// Fail the first N calls, then succeed.
    FailFirst(usize),
    Error,
    Panic,
}

/// Routing client answering after a fixed (virtual) latency.
struct StubClient {
    behavior: Behavior,
    latency: Duration,
    calls: AtomicUsize,
    call_times: Mutex<Vec<(u32, Instant)>>,
}

impl StubClient {
    fn new(behavior: Behavior, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            latency,
            calls: AtomicUsize::new(0),
            call_times: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn call_times(&self) -> Vec<(u32, Instant)> {
        self.call_times.lock().unwrap().clone()
    }
}

#[async_trait]
impl RouteClient for StubClient {
    async fn fetch_route(
        &self,
        request: RouteRequest,
        retain_payload: bool,
        cancel: &CancellationToken,
    ) -> Result<RouteOutcome> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times
            .lock()
            .unwrap()
            .push((request.worker_id, Instant::now()));

        match self.behavior {
            Behavior::Error => bail!("could not build request"),
            Behavior::Panic => panic!("stub exploded"),
            _ => {}
        }

        let start = Instant::now();
        tokio::select! {
            _ = tokio::time::sleep(self.latency) => {}
            _ = cancel.cancelled() => {
                return Ok(RouteOutcome::failure(request, start.elapsed(), "request cancelled"));
            }
        }
        let latency = start.elapsed();

        let succeed = match self.behavior {
            Behavior::Succeed => true,
            Behavior::FailFirst(n) => call >= n,
            _ => false,
        };
        if succeed {
            let payload = retain_payload.then(|| r#"{"paths":[{"distance":1.0}]}"#.to_string());
            Ok(RouteOutcome::success(request, latency, payload))
        } else {
            Ok(RouteOutcome::failure(request, latency, "HTTP 500: no route"))
        }
    }

    async fn health(&self) -> Result<()> {
        Ok(())
    }
}

fn config(duration_minutes: f64, interval_minutes: f64, delay_ms: u64) -> RunConfig {
    RunSettings {
        center: "51.5074,-0.1278".to_string(),
        duration_minutes,
        start_interval_minutes: interval_minutes,
        request_delay_ms: delay_ms,
        seed: Some(1),
        ..Default::default()
    }
    .validate()
    .unwrap()
}

fn worker(id: u32, config: RunConfig, client: Arc<StubClient>, observations: Arc<ObservationSet>) -> Worker {
    Worker::new(
        id,
        Coordinate::new(51.5074, -0.1278),
        Arc::new(config),
        client,
        observations,
    )
}

#[tokio::test(start_paused = true)]
async fn test_always_failing_worker_opens_circuit_without_extra_delay() {
    let client = StubClient::new(Behavior::Fail, Duration::from_millis(10));
    let observations = Arc::new(ObservationSet::new());
    let w = worker(1, config(60.0, 1.0, 100), client.clone(), observations.clone());

    let start = Instant::now();
    let summary = w
        .run(start, start + Duration::from_secs(3600), CancellationToken::new())
        .await;

    assert_eq!(summary.exit, WorkerExit::CircuitOpen);
    assert_eq!(client.calls(), FAILURE_THRESHOLD as usize);
    assert_eq!(summary.requests, FAILURE_THRESHOLD as u64);
    assert_eq!(observations.len().await, FAILURE_THRESHOLD as usize);

    // 5 calls of 10ms and a single delay between the two cycles (3 + 2 probes)
    assert_eq!(start.elapsed(), Duration::from_millis(5 * 10 + 100));
}

#[tokio::test(start_paused = true)]
async fn test_success_resets_failure_count() {
    // 4 failures: cycle 1 fails 3 probes, cycle 2 fails once then succeeds
    let client = StubClient::new(Behavior::FailFirst(4), Duration::from_millis(10));
    let observations = Arc::new(ObservationSet::new());
    let w = worker(1, config(1.0, 1.0, 1000), client.clone(), observations.clone());

    let start = Instant::now();
    let summary = w
        .run(start, start + Duration::from_secs(10), CancellationToken::new())
        .await;

    assert_eq!(summary.exit, WorkerExit::Deadline);
    assert!(summary.successes > 1);
    assert_eq!(summary.requests, summary.successes + 4);
}

#[tokio::test(start_paused = true)]
async fn test_errors_and_panics_count_as_failures() {
    for behavior in [Behavior::Error, Behavior::Panic] {
        let client = StubClient::new(behavior, Duration::from_millis(10));
        let observations = Arc::new(ObservationSet::new());
        let w = worker(7, config(60.0, 1.0, 100), client.clone(), observations.clone());

        let start = Instant::now();
        let summary = w
            .run(start, start + Duration::from_secs(3600), CancellationToken::new())
            .await;

        assert_eq!(summary.exit, WorkerExit::CircuitOpen);
        // A fault aborts its cycle, so each cycle dispatches exactly once
        assert_eq!(client.calls(), FAILURE_THRESHOLD as usize);
        // Nothing reached the service, nothing recorded
        assert!(observations.is_empty().await);
        assert_eq!(summary.requests, 0);
    }
}

#[tokio::test(start_paused = true)]
async fn test_workers_start_on_staggered_schedule() {
    let client = StubClient::new(Behavior::Succeed, Duration::from_millis(10));
    let runner = LoadRunner::new(config(5.0, 1.0, 1000), client.clone());

    let stats = runner.run(CancellationToken::new()).await.unwrap();

    assert_eq!(stats.workers.len(), 5);
    for (n, summary) in stats.workers.iter().enumerate() {
        assert_eq!(summary.worker_id, n as u32 + 1);
        let expected = Duration::from_secs(60 * n as u64);
        let jitter = summary.started_after.abs_diff(expected);
        assert!(jitter <= Duration::from_millis(100), "worker {} started at {:?}", n + 1, summary.started_after);
        assert_eq!(summary.exit, WorkerExit::Deadline);
    }
    assert_eq!(runner.phase(), RunPhase::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_no_request_starts_after_deadline() {
    let client = StubClient::new(Behavior::Succeed, Duration::from_millis(250));
    let runner = LoadRunner::new(config(2.0, 0.5, 100), client.clone());

    let start = Instant::now();
    let stats = runner.run(CancellationToken::new()).await.unwrap();
    let deadline = start + Duration::from_secs(120);

    assert_eq!(stats.workers.len(), 4);
    assert!(client.calls() > 0);
    for (worker_id, at) in client.call_times() {
        assert!(at < deadline, "worker {} dispatched after the deadline", worker_id);
    }
    // In-flight requests were allowed to finish
    assert_eq!(stats.total_requests as usize, client.calls());
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_all_successful() {
    let client = StubClient::new(Behavior::Succeed, Duration::from_millis(50));
    let runner = LoadRunner::new(config(1.0, 1.0, 100), client.clone());

    let stats = runner.run(CancellationToken::new()).await.unwrap();

    assert_eq!(stats.workers.len(), 1);
    assert!(stats.total_requests > 100);
    assert_eq!(stats.failed_requests, 0);
    assert_eq!(stats.success_rate, 100.0);
    assert_eq!(stats.min_latency_ms, 50.0);
    assert_eq!(stats.max_latency_ms, 50.0);
    assert_eq!(stats.mean_latency_ms, 50.0);
    assert_eq!(stats.std_dev_ms, 0.0);

    // Only the worker's first success keeps its payload
    let with_payload = stats.outcomes.iter().filter(|o| o.raw_payload.is_some()).count();
    assert_eq!(with_payload, 1);
    assert!(stats.first_success_per_worker[&1].raw_payload.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_all_failing() {
    let client = StubClient::new(Behavior::Fail, Duration::from_millis(50));
    let runner = LoadRunner::new(config(3.0, 1.0, 100), client.clone());

    let stats = runner.run(CancellationToken::new()).await.unwrap();

    assert_eq!(stats.workers.len(), 3);
    assert_eq!(stats.success_rate, 0.0);
    assert_eq!(stats.successful_requests, 0);
    assert_eq!(stats.mean_latency_ms, 0.0);
    assert_eq!(stats.total_requests, 3 * FAILURE_THRESHOLD as u64);
    assert!(stats.first_success_per_worker.is_empty());
    for summary in &stats.workers {
        assert_eq!(summary.exit, WorkerExit::CircuitOpen);
        assert_eq!(summary.requests, FAILURE_THRESHOLD as u64);
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_keeps_partial_results() {
    let client = StubClient::new(Behavior::Succeed, Duration::from_millis(50));
    let runner = LoadRunner::new(config(5.0, 1.0, 500), client.clone());

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(90)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let stats = runner.run(cancel).await.unwrap();

    assert!(start.elapsed() < Duration::from_secs(91));
    assert_eq!(stats.workers.len(), 2);
    assert!(stats.workers.iter().all(|w| w.exit == WorkerExit::Cancelled));
    assert!(stats.total_requests > 0);
    assert_eq!(runner.phase(), RunPhase::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_phase_transitions() {
    let client = StubClient::new(Behavior::Succeed, Duration::from_millis(10));
    let runner = LoadRunner::new(config(0.5, 1.0, 100), client);
    let mut phases = runner.subscribe();
    assert_eq!(runner.phase(), RunPhase::NotStarted);

    let watcher = tokio::spawn(async move {
        let mut seen = Vec::new();
        while phases.changed().await.is_ok() {
            let phase = *phases.borrow_and_update();
            seen.push(phase);
            if phase == RunPhase::Completed {
                break;
            }
        }
        seen
    });

    runner.run(CancellationToken::new()).await.unwrap();
    let seen = watcher.await.unwrap();
    assert_eq!(seen.last(), Some(&RunPhase::Completed));
    assert!(seen.contains(&RunPhase::Draining));
}

#[tokio::test(start_paused = true)]
async fn test_validate_center_retries_second_direction() {
    let config = config(1.0, 1.0, 100);

    let flaky = StubClient::new(Behavior::FailFirst(1), Duration::from_millis(10));
    assert!(preflight::validate_center(flaky.as_ref(), &config).await);
    assert_eq!(flaky.calls(), 2);

    let broken = StubClient::new(Behavior::Fail, Duration::from_millis(10));
    assert!(!preflight::validate_center(broken.as_ref(), &config).await);
    assert_eq!(broken.calls(), 2);

    assert!(preflight::check_connectivity(broken.as_ref()).await);
}
