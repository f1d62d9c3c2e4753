use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::service::HoldingsService;

/// Keeps the snapshot warm by asking for it on a fixed period, so a stale
/// snapshot is replaced before a caller has to wait on the extraction.
/// Goes through the same single-flight gate as request traffic.
pub struct SnapshotRefresher {
    holdings: HoldingsService,
    period: Duration,
}

impl SnapshotRefresher {
    pub fn new(holdings: HoldingsService, period: Duration) -> Self {
        Self { holdings, period }
    }

    pub async fn run(self) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // first tick fires immediately; warm-up already ran

        loop {
            ticker.tick().await;
            match self.holdings.get_holdings().await {
                Ok(snapshot) => debug!(
                    taken_at = %snapshot.timestamp,
                    "Background refresh check complete"
                ),
                Err(e) => warn!("Background refresh found no data: {e}"),
            }
        }
    }
}
