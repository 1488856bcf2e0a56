//! Load test orchestration: staggered worker start, drain, reduction.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::client::RouteClient;
use crate::config::RunConfig;
use crate::generator::CoordinateSampler;
use crate::metrics::{ObservationSet, Statistics};
use crate::worker::Worker;

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    NotStarted,
    /// Workers are being started on schedule.
    Running,
    /// No more workers will start; waiting for the running ones.
    Draining,
    Completed,
}

/// Executes a load test against a routing service.
pub struct LoadRunner {
    client: Arc<dyn RouteClient>,
    config: Arc<RunConfig>,
    phase: watch::Sender<RunPhase>,
    show_progress: bool,
}

impl LoadRunner {
    /// Create a new load runner.
    pub fn new(config: RunConfig, client: Arc<dyn RouteClient>) -> Self {
        let (phase, _) = watch::channel(RunPhase::NotStarted);
        Self {
            client,
            config: Arc::new(config),
            phase,
            show_progress: false,
        }
    }

    /// Draw a progress bar on stderr while running.
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn phase(&self) -> RunPhase {
        *self.phase.borrow()
    }

    /// Watch phase transitions.
    pub fn subscribe(&self) -> watch::Receiver<RunPhase> {
        self.phase.subscribe()
    }

    /// Run the load test until its duration elapses or `cancel` fires.
    ///
    /// The Nth worker starts `(N - 1) * start_interval` after the run start.
    /// Workers already running when the end time passes finish their
    /// in-flight request; nothing new is sent after that.
    pub async fn run(&self, cancel: CancellationToken) -> anyhow::Result<Statistics> {
        let config = &self.config;
        let started_at = Utc::now();
        let start = Instant::now();
        let deadline = start + config.duration();

        info!(
            url = config.base_url(),
            center = %config.center(),
            duration_secs = config.duration().as_secs_f64(),
            start_interval_secs = config.start_interval().as_secs_f64(),
            "Starting load test"
        );
        self.phase.send_replace(RunPhase::Running);

        let progress = self.progress_bar()?;
        let stop_progress = CancellationToken::new();
        let progress_task = progress.clone().map(|pb| {
            tokio::spawn(track_progress(
                pb,
                start,
                config.duration(),
                self.subscribe(),
                stop_progress.clone(),
            ))
        });

        let observations = Arc::new(ObservationSet::new());
        let mut sampler = CoordinateSampler::new(config.seed(), 0);
        let mut workers = JoinSet::new();
        let mut worker_count: u32 = 0;

        while Instant::now() < deadline && !cancel.is_cancelled() {
            worker_count += 1;
            let target = sampler.target(config.center(), config.target_radius_km());
            info!(worker = worker_count, target = %target, "Starting worker");

            let worker = Worker::new(
                worker_count,
                target,
                self.config.clone(),
                self.client.clone(),
                observations.clone(),
            );
            workers.spawn(worker.run(start, deadline, cancel.clone()));

            if let Some(ref pb) = progress {
                pb.set_message(format!("{} workers", worker_count));
            }

            // Absolute schedule, so a slow spawn doesn't push later workers back
            let next_start = config
                .start_interval()
                .checked_mul(worker_count)
                .and_then(|offset| start.checked_add(offset))
                .map_or(deadline, |at| at.min(deadline));
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep_until(next_start) => {}
            }
        }

        self.phase.send_replace(RunPhase::Draining);
        info!(workers = worker_count, "All workers started, waiting for completion");

        let mut summaries = Vec::with_capacity(worker_count as usize);
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(summary) => summaries.push(summary),
                Err(e) => error!(error = %e, "Worker task failed"),
            }
        }

        let finished_at = Utc::now();
        self.phase.send_replace(RunPhase::Completed);

        stop_progress.cancel();
        if let Some(task) = progress_task {
            task.await.ok();
        }

        let stats = Statistics::from_outcomes(observations.drain().await, started_at, finished_at, summaries);
        log_statistics(&stats);
        Ok(stats)
    }

    fn progress_bar(&self) -> anyhow::Result<Option<ProgressBar>> {
        if !self.show_progress {
            return Ok(None);
        }
        let pb = ProgressBar::new(self.config.duration().as_secs());
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len}s {msg}")?
                .progress_chars("##-"),
        );
        Ok(Some(pb))
    }
}

async fn track_progress(
    pb: ProgressBar,
    start: Instant,
    total: Duration,
    mut phase: watch::Receiver<RunPhase>,
    stop: CancellationToken,
) {
    let mut tick = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            changed = phase.changed() => {
                if changed.is_err() {
                    break;
                }
                if *phase.borrow() == RunPhase::Draining {
                    pb.set_message("Waiting for in-flight requests...");
                }
            }
            _ = tick.tick() => {
                pb.set_position(start.elapsed().min(total).as_secs());
            }
        }
    }
    pb.finish_with_message("Complete!");
}

fn log_statistics(stats: &Statistics) {
    info!(
        total = stats.total_requests,
        successful = stats.successful_requests,
        failed = stats.failed_requests,
        success_rate = %format_args!("{:.2}%", stats.success_rate),
        "Load test completed"
    );
    info!(
        mean_ms = %format_args!("{:.2}", stats.mean_latency_ms),
        min_ms = %format_args!("{:.2}", stats.min_latency_ms),
        max_ms = %format_args!("{:.2}", stats.max_latency_ms),
        std_dev_ms = %format_args!("{:.2}", stats.std_dev_ms),
        "Response times"
    );
}
