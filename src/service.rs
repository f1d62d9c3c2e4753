use std::sync::Arc;

use tracing::{info, warn};

use crate::error::NoDataAvailable;
use crate::state::SnapshotCache;
use crate::types::Snapshot;

/// The one entry point the HTTP layer uses. Cache internals stay behind it.
#[derive(Clone)]
pub struct HoldingsService {
    cache: Arc<SnapshotCache>,
}

impl HoldingsService {
    pub fn new(cache: Arc<SnapshotCache>) -> Self {
        Self { cache }
    }

    pub async fn get_holdings(&self) -> Result<Arc<Snapshot>, NoDataAvailable> {
        self.cache.get_or_refresh().await
    }

    /// Startup fetch. A failure leaves the cache empty and is only logged.
    pub async fn warm_up(&self) {
        match self.get_holdings().await {
            Ok(snapshot) => info!(
                items = snapshot.item_count,
                taken_at = %snapshot.timestamp,
                "Initial data fetch complete"
            ),
            Err(e) => warn!("Initial data fetch failed: {e}"),
        }
    }

    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }
}
