use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use thiserror::Error;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::model::Feed;
use crate::provider::{FetchError, MarketData};
use crate::publisher::{PublishError, Publisher};

/// Everything that can go wrong inside one poll cycle. Both variants are
/// logged and swallowed; only the shutdown token ends the loop.
#[derive(Debug, Error)]
enum CycleError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Polling,
    Stopped,
}

pub struct PollLoop {
    client: Arc<dyn MarketData>,
    publisher: Publisher,
    symbol: String,
    feed: Feed,
    interval: Duration,
    shutdown: CancellationToken,
}

impl PollLoop {
    pub fn new(
        client: Arc<dyn MarketData>,
        publisher: Publisher,
        symbol: String,
        feed: Feed,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            client,
            publisher,
            symbol,
            feed,
            interval,
            shutdown,
        }
    }

    /// Run fetch/publish cycles until the shutdown token fires. The sleep is
    /// cancellation-aware, so shutdown latency is bounded by the in-flight
    /// fetch rather than the full interval.
    pub async fn run(self) {
        info!(
            "poll loop started: symbol={} feed={} interval={}s file={}",
            self.symbol,
            self.feed,
            self.interval.as_secs(),
            self.publisher.path().display()
        );

        let mut state = LoopState::Polling;
        while state == LoopState::Polling {
            if self.shutdown.is_cancelled() {
                state = LoopState::Stopped;
                continue;
            }

            match self.cycle().await {
                Ok(()) => {}
                Err(CycleError::Fetch(e)) => {
                    warn!("fetch error from {}: {e}", self.client.name());
                }
                Err(CycleError::Publish(e)) => {
                    warn!("publish error: {e}");
                }
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => state = LoopState::Stopped,
                _ = sleep(self.interval) => {}
            }
        }

        info!("poll loop stopped cleanly");
    }

    async fn cycle(&self) -> Result<(), CycleError> {
        let snapshot = self.client.fetch_latest(&self.symbol, self.feed).await?;
        self.publisher.publish(&snapshot).await?;
        info!(
            "{} - updated: bid=${:.2} ask=${:.2} last=${:.2}",
            Local::now().format("%H:%M:%S"),
            snapshot.bid_price,
            snapshot.ask_price,
            snapshot.last_price
        );
        Ok(())
    }
}
