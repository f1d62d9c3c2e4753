use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::db::models::SnapshotRow;
use crate::error::{PersistenceError, Result};
use crate::types::Snapshot;

/// Last-known-good snapshot storage. Best effort: callers log failures and move on.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load_latest(&self) -> std::result::Result<Snapshot, PersistenceError>;
    async fn save(&self, snapshot: &Snapshot) -> std::result::Result<(), PersistenceError>;
}

pub struct SqliteSnapshotStore {
    pool: SqlitePool,
    retention: u32,
}

impl SqliteSnapshotStore {
    /// Open (creating if missing) the database at `db_path` and run migrations.
    pub async fn open(db_path: &str, retention: u32) -> Result<Self> {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await?;

        let store = Self::with_pool(pool, retention).await?;
        let held = store.count().await.unwrap_or(0);
        info!("Snapshot store ready at {db_path} ({held} snapshots held)");
        Ok(store)
    }

    pub async fn with_pool(pool: SqlitePool, retention: u32) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self {
            pool,
            retention: retention.max(1),
        })
    }

    pub async fn count(&self) -> std::result::Result<i64, PersistenceError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM snapshots")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    async fn load_latest(&self) -> std::result::Result<Snapshot, PersistenceError> {
        let row: Option<SnapshotRow> = sqlx::query_as(
            r#"
            SELECT id, taken_at, item_count, payload
            FROM snapshots
            ORDER BY taken_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Err(PersistenceError::Empty);
        };

        let snapshot: Snapshot = serde_json::from_str(&row.payload)?;
        let n = snapshot.items.len();
        if snapshot.item_count != n || row.item_count as usize != n {
            return Err(PersistenceError::Corrupt(format!(
                "row {} claims {} items, payload has {n}",
                row.id, snapshot.item_count
            )));
        }
        check_ranking(&snapshot)
            .map_err(|e| PersistenceError::Corrupt(format!("row {}: {e}", row.id)))?;

        debug!(row_id = row.id, taken_at = %row.taken_at, "Loaded persisted snapshot");
        Ok(snapshot)
    }

    async fn save(&self, snapshot: &Snapshot) -> std::result::Result<(), PersistenceError> {
        let payload = serde_json::to_string(snapshot)?;
        let taken_at = snapshot.timestamp.to_rfc3339();
        let item_count = snapshot.item_count as i64;

        sqlx::query("INSERT INTO snapshots (taken_at, item_count, payload) VALUES (?, ?, ?)")
            .bind(&taken_at)
            .bind(item_count)
            .bind(&payload)
            .execute(&self.pool)
            .await?;

        let pruned = sqlx::query(
            r#"
            DELETE FROM snapshots
            WHERE id NOT IN (
                SELECT id FROM snapshots ORDER BY taken_at DESC, id DESC LIMIT ?
            )
            "#,
        )
        .bind(i64::from(self.retention))
        .execute(&self.pool)
        .await?
        .rows_affected();

        debug!(taken_at = %taken_at, items = item_count, pruned, "Persisted snapshot");
        Ok(())
    }
}

/// A stored snapshot must still be ranked: positions 1..=n, weights
/// non-increasing, one entry per ticker.
fn check_ranking(snapshot: &Snapshot) -> std::result::Result<(), String> {
    let mut seen = HashSet::with_capacity(snapshot.items.len());
    for (idx, item) in snapshot.items.iter().enumerate() {
        if item.position as usize != idx + 1 {
            return Err(format!("entry {} has position {}", idx + 1, item.position));
        }
        if !seen.insert(item.ticker.as_str()) {
            return Err(format!("duplicate ticker {}", item.ticker));
        }
    }
    for pair in snapshot.items.windows(2) {
        if pair[0].percent.total_cmp(&pair[1].percent).is_lt() {
            return Err(format!(
                "{} ({}%) ranked above {} ({}%)",
                pair[0].ticker, pair[0].percent, pair[1].ticker, pair[1].percent
            ));
        }
    }
    Ok(())
}
