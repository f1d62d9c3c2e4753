//! Shared refresh counters for the /stats/refresh endpoint.
//! Updated by SnapshotCache, read by the API.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Refresh outcome counters. Written by the cache, read by the API.
#[derive(Default)]
pub struct HealthState {
    /// Extractions that produced a new snapshot.
    pub refresh_successes: AtomicU64,
    /// Extractions that failed, whatever was served instead.
    pub refresh_failures: AtomicU64,
    /// Requests answered with an older snapshot because the refresh failed.
    pub stale_served: AtomicU64,
    /// Snapshots adopted from the persisted store.
    pub persisted_loads: AtomicU64,
    /// Millisecond UTC epoch of the last successful refresh (0 = none).
    pub last_success_at_ms: AtomicI64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, at_ms: i64) {
        self.refresh_successes.fetch_add(1, Ordering::Relaxed);
        self.last_success_at_ms.store(at_ms, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.refresh_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_stale_served(&self) {
        self.stale_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_persisted_loads(&self) {
        self.persisted_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn refresh_successes(&self) -> u64 {
        self.refresh_successes.load(Ordering::Relaxed)
    }

    pub fn refresh_failures(&self) -> u64 {
        self.refresh_failures.load(Ordering::Relaxed)
    }

    pub fn stale_served(&self) -> u64 {
        self.stale_served.load(Ordering::Relaxed)
    }

    pub fn persisted_loads(&self) -> u64 {
        self.persisted_loads.load(Ordering::Relaxed)
    }

    pub fn last_success_at_ms(&self) -> i64 {
        self.last_success_at_ms.load(Ordering::Relaxed)
    }
}
