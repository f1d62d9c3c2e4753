use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::db::SnapshotStore;
use crate::error::{ExtractionError, NoDataAvailable};
use crate::fetcher::HoldingsSource;
use crate::ranking::build_snapshot;
use crate::state::clock::Clock;
use crate::tickers::TickerMap;
use crate::types::{RawRow, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Empty,
    /// Snapshot younger than the TTL.
    Fresh,
    /// Snapshot at or past the TTL. Still served if a refresh fails.
    Stale,
}

impl std::fmt::Display for CacheState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CacheState::Empty => "empty",
            CacheState::Fresh => "fresh",
            CacheState::Stale => "stale",
        };
        write!(f, "{s}")
    }
}

/// Everything readers may observe. Always replaced under one write lock.
#[derive(Debug, Default)]
struct CacheRecord {
    snapshot: Option<Arc<Snapshot>>,
    /// Capture time of `snapshot`. Only moves on a successful refresh or a persisted load.
    fetched_at: Option<DateTime<Utc>>,
    refreshing: bool,
    /// Completed refresh attempts, successful or not.
    attempts: u64,
    last_failure: Option<String>,
}

/// Owns the current holdings snapshot and decides when to refetch it.
///
/// Single-flight: at most one extraction runs at a time. Callers that arrive
/// while one is in flight wait for it and get its outcome rather than
/// starting another. The extraction runs on its own task, so a caller that
/// goes away mid-refresh does not cancel it.
///
/// The persisted fallback is read after the gate is released, so a slow store
/// never holds up the next extraction.
///
/// Extraction and persistence errors never leave this type while any snapshot
/// can be served; only [`NoDataAvailable`] does.
pub struct SnapshotCache {
    source: Arc<dyn HoldingsSource>,
    tickers: Arc<TickerMap>,
    clock: Arc<dyn Clock>,
    ttl: TimeDelta,
    store: Option<Arc<dyn SnapshotStore>>,
    persist_tx: Option<mpsc::Sender<Arc<Snapshot>>>,
    health: Arc<HealthState>,
    latency: Arc<LatencyStats>,
    record: RwLock<CacheRecord>,
    refresh_gate: Arc<Mutex<()>>,
}

impl SnapshotCache {
    pub fn new(
        source: Arc<dyn HoldingsSource>,
        tickers: Arc<TickerMap>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            source,
            tickers,
            clock,
            ttl: TimeDelta::from_std(ttl).unwrap_or_else(|_| TimeDelta::max_value()),
            store: None,
            persist_tx: None,
            health: Arc::new(HealthState::new()),
            latency: Arc::new(LatencyStats::new()),
            record: RwLock::new(CacheRecord::default()),
            refresh_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Read fallback from `store`; hand new snapshots to the writer behind `persist_tx`.
    pub fn with_persistence(
        mut self,
        store: Arc<dyn SnapshotStore>,
        persist_tx: mpsc::Sender<Arc<Snapshot>>,
    ) -> Self {
        self.store = Some(store);
        self.persist_tx = Some(persist_tx);
        self
    }

    pub fn with_stats(mut self, health: Arc<HealthState>, latency: Arc<LatencyStats>) -> Self {
        self.health = health;
        self.latency = latency;
        self
    }

    pub fn state(&self) -> CacheState {
        let record = self.read();
        match record.fetched_at {
            _ if record.snapshot.is_none() => CacheState::Empty,
            Some(at) if self.clock.now() - at < self.ttl => CacheState::Fresh,
            _ => CacheState::Stale,
        }
    }

    /// The snapshot currently held, fresh or not. Never triggers a refresh.
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.read().snapshot.clone()
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.read().fetched_at
    }

    pub fn is_refreshing(&self) -> bool {
        self.read().refreshing
    }

    /// Fresh snapshot if held, otherwise refresh (or wait for the refresh in
    /// flight) and fall back to stale or persisted data on failure.
    pub async fn get_or_refresh(self: &Arc<Self>) -> Result<Arc<Snapshot>, NoDataAvailable> {
        let observed = {
            let record = self.read();
            if let Some(snapshot) = self.fresh_snapshot(&record) {
                debug!("Using cached holdings data");
                return Ok(snapshot);
            }
            record.attempts
        };

        let gate = Arc::clone(&self.refresh_gate).lock_owned().await;

        let shared = {
            let record = self.read();
            // A refresh finished while we waited for the gate: share its outcome.
            (record.attempts != observed).then(|| match &record.snapshot {
                Some(snapshot) => Ok(Arc::clone(snapshot)),
                None => Err(record
                    .last_failure
                    .clone()
                    .unwrap_or_else(|| "refresh failed".to_string())),
            })
        };
        if let Some(outcome) = shared {
            drop(gate);
            return match outcome {
                Ok(snapshot) => Ok(snapshot),
                Err(reason) => self.load_persisted(reason).await,
            };
        }

        let this = Arc::clone(self);
        let task = tokio::spawn(async move {
            let attempt = {
                let _gate = gate;
                this.refresh().await
            };
            match attempt {
                Ok(snapshot) => Ok(snapshot),
                Err(reason) => this.load_persisted(reason).await,
            }
        });

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Holdings refresh task failed: {e}");
                self.health.record_failure();
                let reason = format!("refresh task failed: {e}");
                match self.finish_attempt(|r| r.last_failure = Some(reason.clone())) {
                    Some(prior) => Ok(prior),
                    None => Err(NoDataAvailable { reason }),
                }
            }
        }
    }

    fn fresh_snapshot(&self, record: &CacheRecord) -> Option<Arc<Snapshot>> {
        let at = record.fetched_at?;
        if self.clock.now() - at < self.ttl {
            record.snapshot.clone()
        } else {
            None
        }
    }

    /// Runs with the refresh gate held. `Err` carries the failure reason when
    /// there is nothing in memory to fall back to.
    async fn refresh(&self) -> Result<Arc<Snapshot>, String> {
        self.write().refreshing = true;
        info!("Fetching fresh holdings data");

        let started = Instant::now();
        let fetched = self.source.fetch_raw_rows().await;
        self.latency.record(started.elapsed());

        match fetched {
            Ok(rows) => Ok(self.install(rows)),
            Err(e) => self.fall_back(e),
        }
    }

    fn install(&self, rows: Vec<RawRow>) -> Arc<Snapshot> {
        let now = self.clock.now();
        let snapshot = Arc::new(build_snapshot(rows, &self.tickers, now));

        self.finish_attempt(|r| {
            r.snapshot = Some(Arc::clone(&snapshot));
            r.fetched_at = Some(now);
            r.last_failure = None;
        });
        self.health.record_success(now.timestamp_millis());
        info!(
            items = snapshot.item_count,
            total_percent = snapshot.total_percent(),
            "Holdings snapshot refreshed with {} items",
            snapshot.item_count
        );

        if let Some(tx) = &self.persist_tx {
            match tx.try_send(Arc::clone(&snapshot)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!("Snapshot writer channel full, skipping persistence");
                }
                Err(TrySendError::Closed(_)) => {
                    error!("Snapshot writer has stopped, snapshot not persisted");
                }
            }
        }
        snapshot
    }

    fn fall_back(&self, err: ExtractionError) -> Result<Arc<Snapshot>, String> {
        let reason = err.to_string();
        self.health.record_failure();
        warn!("Holdings refresh failed: {reason}");

        if let Some(prior) = self.finish_attempt_if_held(&reason) {
            self.health.inc_stale_served();
            info!(
                taken_at = %prior.timestamp,
                "Error fetching fresh data, using cached data"
            );
            return Ok(prior);
        }

        self.finish_attempt(|r| r.last_failure = Some(reason.clone()));
        Err(reason)
    }

    /// Cold-start fallback. Runs without the refresh gate; the loaded snapshot
    /// is adopted only if nothing was installed while the store was read.
    async fn load_persisted(&self, reason: String) -> Result<Arc<Snapshot>, NoDataAvailable> {
        let Some(store) = &self.store else {
            return Err(NoDataAvailable { reason });
        };

        let loaded = match store.load_latest().await {
            Ok(snapshot) => Arc::new(snapshot),
            Err(e) => {
                warn!("Persisted snapshot unavailable: {e}");
                return Err(NoDataAvailable { reason });
            }
        };

        let mut record = self.write();
        if let Some(current) = &record.snapshot {
            debug!("Snapshot installed during persisted load, discarding loaded copy");
            return Ok(Arc::clone(current));
        }
        record.snapshot = Some(Arc::clone(&loaded));
        // The persisted capture time, so the TTL still reflects real age.
        record.fetched_at = Some(loaded.timestamp);
        drop(record);

        self.health.inc_persisted_loads();
        info!(
            taken_at = %loaded.timestamp,
            items = loaded.item_count,
            "Loaded holdings data from persisted snapshot"
        );
        Ok(loaded)
    }

    /// Close out a failed attempt if a prior snapshot exists, in one write.
    fn finish_attempt_if_held(&self, reason: &str) -> Option<Arc<Snapshot>> {
        let mut record = self.write();
        let prior = record.snapshot.clone()?;
        record.last_failure = Some(reason.to_string());
        record.refreshing = false;
        record.attempts += 1;
        Some(prior)
    }

    /// Apply `update`, clear the in-flight flag and count the attempt, all
    /// under one write lock. Returns the snapshot held afterwards.
    fn finish_attempt(&self, update: impl FnOnce(&mut CacheRecord)) -> Option<Arc<Snapshot>> {
        let mut record = self.write();
        update(&mut record);
        record.refreshing = false;
        record.attempts += 1;
        record.snapshot.clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheRecord> {
        self.record.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheRecord> {
        self.record.write().unwrap_or_else(PoisonError::into_inner)
    }
}
