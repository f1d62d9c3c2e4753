/// Row type for the `snapshots` table (migrations/0001_create_snapshots.sql).

#[derive(Debug, sqlx::FromRow)]
pub struct SnapshotRow {
    pub id: i64,
    /// RFC 3339 capture time, duplicated out of the payload for ordering.
    pub taken_at: String,
    pub item_count: i64,
    /// Full snapshot JSON in its wire shape.
    pub payload: String,
}
