//! Shared state for the simulator handlers.

use std::time::Duration;

use anyhow::{ensure, Result};
use rand::Rng;

/// Response delay range applied to every endpoint.
#[derive(Debug, Clone)]
pub struct SimulatorState {
    min_delay: Duration,
    max_delay: Duration,
}

impl SimulatorState {
    pub fn new(min_delay: Duration, max_delay: Duration) -> Result<Self> {
        ensure!(
            min_delay <= max_delay,
            "min delay ({:?}) must not exceed max delay ({:?})",
            min_delay,
            max_delay
        );
        Ok(Self { min_delay, max_delay })
    }

    /// No artificial latency at all.
    pub fn instant() -> Self {
        Self {
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Pick a delay uniformly from the configured range.
    pub fn random_delay(&self) -> Duration {
        if self.min_delay == self.max_delay {
            return self.min_delay;
        }
        rand::thread_rng().gen_range(self.min_delay..=self.max_delay)
    }

    /// Sleep for a random delay.
    pub async fn delay(&self) {
        let delay = self.random_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
