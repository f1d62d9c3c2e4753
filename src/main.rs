mod api;
mod config;
mod db;
mod error;
mod fetcher;
mod ranking;
mod refresh;
mod service;
mod state;
mod tickers;
mod types;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::api::routes::{router, ApiState};
use crate::config::{Config, CHANNEL_CAPACITY};
use crate::db::{SnapshotWriter, SqliteSnapshotStore};
use crate::error::Result;
use crate::fetcher::HtmlTableSource;
use crate::refresh::SnapshotRefresher;
use crate::service::HoldingsService;
use crate::state::{SnapshotCache, SystemClock};
use crate::tickers::TickerMap;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Ticker table ---
    let tickers = Arc::new(TickerMap::load(cfg.ticker_map_path.as_deref())?);
    info!("Ticker table loaded with {} symbols", tickers.len());

    // --- Extraction adapter ---
    let source = HtmlTableSource::from_config(&cfg)?;

    // --- Shared stats ---
    let health = Arc::new(HealthState::new());
    let latency = Arc::new(LatencyStats::new());

    // --- Snapshot cache ---
    let mut cache = SnapshotCache::new(
        Arc::new(source),
        tickers,
        Arc::new(SystemClock),
        cfg.cache_ttl,
    )
    .with_stats(Arc::clone(&health), Arc::clone(&latency));

    // Persistence is optional: without it the service still runs, just
    // without a cold-start fallback.
    match &cfg.db_path {
        Some(db_path) => match SqliteSnapshotStore::open(db_path, cfg.snapshot_retention).await {
            Ok(store) => {
                let store = Arc::new(store);
                let (persist_tx, persist_rx) = mpsc::channel(CHANNEL_CAPACITY);
                let writer = SnapshotWriter::new(store.clone(), persist_rx);
                tokio::spawn(async move { writer.run().await });
                cache = cache.with_persistence(store, persist_tx);
            }
            Err(e) => warn!("Snapshot persistence disabled, could not open {db_path}: {e}"),
        },
        None => info!("DB_PATH empty, snapshot persistence disabled"),
    }

    let holdings = HoldingsService::new(Arc::new(cache));
    info!(
        ttl_ms = cfg.cache_ttl.as_millis() as u64,
        source = %cfg.source_url,
        "Holdings cache ready"
    );

    // --- Initial fetch (never fatal) ---
    let warm = holdings.clone();
    tokio::spawn(async move { warm.warm_up().await });

    // --- Background refresher (optional) ---
    if let Some(period) = cfg.refresh_interval {
        info!("Background refresh every {}s", period.as_secs());
        let refresher = SnapshotRefresher::new(holdings.clone(), period);
        tokio::spawn(async move { refresher.run().await });
    }

    // --- HTTP API server ---
    let app = router(ApiState {
        holdings,
        health,
        latency,
    });
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Holdings API listening on {bind_addr}");
    info!("- Holdings endpoint: http://localhost:{}/holdings", cfg.api_port);
    info!("- Health endpoint: http://localhost:{}/health", cfg.api_port);

    axum::serve(listener, app).await?;

    Ok(())
}
