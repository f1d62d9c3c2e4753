use std::time::Duration;

use crate::error::{AppError, Result};

pub const SOURCE_URL: &str = "https://www.invesco.com/qqq-etf/en/about.html";

/// CSS class of the `<tbody>` holding one `<tr>` per constituent.
pub const TABLE_BODY_CLASS: &str = "view-all-holdings__table-body";

/// Snapshot time-to-live (milliseconds). Older snapshots are stale.
pub const DEFAULT_CACHE_TTL_MS: u64 = 3_600_000;

/// Upper bound on a single page fetch, connect through body (seconds).
pub const DEFAULT_EXTRACT_TIMEOUT_SECS: u64 = 60;

/// Number of persisted snapshots kept in SQLite.
pub const DEFAULT_SNAPSHOT_RETENTION: u32 = 24;

/// Channel capacity between the cache and the snapshot writer.
pub const CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub api_port: u16,
    pub source_url: String,
    pub table_body_class: String,
    pub extract_timeout: Duration,
    pub cache_ttl: Duration,
    /// SQLite file for snapshot persistence (DB_PATH). None disables persistence.
    pub db_path: Option<String>,
    pub snapshot_retention: u32,
    /// JSON file merged over the built-in ticker table (TICKER_MAP_PATH).
    pub ticker_map_path: Option<String>,
    /// Background refresh period (REFRESH_INTERVAL_SECS). None = refresh on demand only.
    pub refresh_interval: Option<Duration>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let db_path = std::env::var("DB_PATH").unwrap_or_else(|_| "holdings.db".to_string());
        let refresh_secs: u64 = parse_env("REFRESH_INTERVAL_SECS", 0)?;

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            api_port: parse_env("PORT", 3000)?,
            source_url: std::env::var("SOURCE_URL").unwrap_or_else(|_| SOURCE_URL.to_string()),
            table_body_class: std::env::var("TABLE_BODY_CLASS")
                .unwrap_or_else(|_| TABLE_BODY_CLASS.to_string()),
            extract_timeout: Duration::from_secs(parse_env(
                "EXTRACT_TIMEOUT_SECS",
                DEFAULT_EXTRACT_TIMEOUT_SECS,
            )?),
            cache_ttl: Duration::from_millis(parse_env("CACHE_TTL_MS", DEFAULT_CACHE_TTL_MS)?),
            db_path: Some(db_path.trim().to_string()).filter(|p| !p.is_empty()),
            snapshot_retention: parse_env("SNAPSHOT_RETENTION", DEFAULT_SNAPSHOT_RETENTION)?,
            ticker_map_path: std::env::var("TICKER_MAP_PATH")
                .ok()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
            refresh_interval: (refresh_secs > 0).then(|| Duration::from_secs(refresh_secs)),
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{key} must be a valid number, got {raw:?}"))),
        Err(_) => Ok(default),
    }
}
