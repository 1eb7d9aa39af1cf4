//! Scheduled quota reset
//!
//! Clears every quota record on a fixed interval. The first reset fires one
//! full interval after the job starts, then every interval after that.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::info;

use super::CancellationToken;
use crate::quota::QuotaTracker;

/// Background job resetting a [`QuotaTracker`] every window
#[derive(Debug, Clone)]
pub struct QuotaResetJob {
    tracker: QuotaTracker,
    period: Duration,
}

impl QuotaResetJob {
    /// Reset `tracker` every `tracker.window()`
    #[must_use]
    pub const fn new(tracker: QuotaTracker) -> Self {
        let period = tracker.window();
        Self { tracker, period }
    }

    /// Reset period
    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Run until `token` is cancelled
    pub async fn run(self, token: &CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = token.cancelled() => {
                    info!("Quota reset job stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let cleared = self.tracker.reset();
                    info!(cleared, period_secs = self.period.as_secs(), "Hourly reset, quota stats cleared");
                }
            }
        }
    }

    /// Spawn the job on the current runtime
    #[must_use]
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(&token).await })
    }
}
