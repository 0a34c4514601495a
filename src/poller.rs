use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::service::FeedService;

/// Background task refreshing every feed on a fixed interval.
pub struct Poller {
    service: FeedService,
    interval: Duration,
}

impl Poller {
    pub fn new(service: FeedService, interval: Duration) -> Self {
        Self { service, interval }
    }

    /// Run until `cancel` fires.
    ///
    /// The first refresh happens one full interval after start. A pass that
    /// is still running when the token fires is abandoned.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval() completes its first tick immediately
        ticker.tick().await;

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Feed poller started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.service.refresh_all(&cancel).await {
                Ok(summary) => tracing::info!(
                    feeds = summary.feeds,
                    added = summary.added,
                    failed = summary.failed,
                    "Poll complete"
                ),
                Err(e) if cancel.is_cancelled() => {
                    tracing::debug!(error = %e, "Poll interrupted by shutdown");
                }
                Err(e) => tracing::error!(error = %e, "Poll failed"),
            }
        }

        tracing::info!("Feed poller stopped");
    }
}
