use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Extraction output
// ---------------------------------------------------------------------------

/// One holdings table row exactly as extracted. Nothing here is validated yet.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub company_name: String,
    pub percent_text: String,
    pub row_id: String,
    /// Zero-based row index on the page.
    pub ordinal: usize,
}

impl RawRow {
    pub fn new(
        company_name: impl Into<String>,
        percent_text: impl Into<String>,
        row_id: impl Into<String>,
        ordinal: usize,
    ) -> Self {
        Self {
            company_name: company_name.into(),
            percent_text: percent_text.into(),
            row_id: row_id.into(),
            ordinal,
        }
    }
}

// ---------------------------------------------------------------------------
// Canonical snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingEntry {
    /// 1-based rank by weight.
    pub position: u32,
    pub company: String,
    /// Resolved symbol, or the company name when no symbol is known.
    pub ticker: String,
    pub percent: f64,
    pub id: String,
}

/// One fully ranked holdings result. Handed out as `Arc<Snapshot>` by the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub item_count: usize,
    pub items: Vec<HoldingEntry>,
}

impl Snapshot {
    pub fn new(timestamp: DateTime<Utc>, items: Vec<HoldingEntry>) -> Self {
        Self {
            timestamp,
            item_count: items.len(),
            items,
        }
    }

    pub fn total_percent(&self) -> f64 {
        self.items.iter().map(|e| e.percent).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn snapshot_serializes_to_wire_shape() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let snapshot = Snapshot::new(
            ts,
            vec![HoldingEntry {
                position: 1,
                company: "Apple Inc".to_string(),
                ticker: "AAPL".to_string(),
                percent: 8.75,
                id: "F000000B9J".to_string(),
            }],
        );

        let v = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(v["timestamp"], "2025-03-01T12:00:00Z");
        assert_eq!(v["itemCount"], 1);
        assert_eq!(v["items"][0]["position"], 1);
        assert_eq!(v["items"][0]["ticker"], "AAPL");
        assert_eq!(v["items"][0]["percent"], 8.75);
        assert_eq!(v["items"][0]["id"], "F000000B9J");
    }
}
