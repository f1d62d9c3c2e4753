//! Turns extracted rows into a ranked [`Snapshot`].
//!
//! Rows whose weight text does not parse are kept with a weight of `0.0`
//! rather than failing the refresh: one bad cell on the page should not
//! cost the whole table. Such rows sink to the bottom of the ranking.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::tickers::TickerMap;
use crate::types::{HoldingEntry, RawRow, Snapshot};

/// Parse a weight cell such as `"8.75%"`. Anything that is not a finite,
/// non-negative number yields `0.0`.
pub fn parse_percent(text: &str) -> f64 {
    let trimmed = text.trim();
    let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
    match number.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => v,
        _ => {
            debug!(text, "Unparseable weight, using 0.0");
            0.0
        }
    }
}

/// All rows that resolved to one ticker, in page order.
struct Group {
    ticker: String,
    members: Vec<Member>,
}

struct Member {
    company: String,
    row_id: String,
    percent: f64,
    is_primary_listing: bool,
}

impl Group {
    /// The member reported under the merged symbol itself, else the first seen.
    fn canonical(&self) -> &Member {
        self.members
            .iter()
            .find(|m| m.is_primary_listing)
            .unwrap_or(&self.members[0])
    }

    fn into_entry(self) -> HoldingEntry {
        let percent: f64 = self.members.iter().map(|m| m.percent).sum();
        if self.members.len() > 1 {
            let parts: Vec<String> = self
                .members
                .iter()
                .map(|m| format!("{} {}%", m.company, m.percent))
                .collect();
            info!(
                ticker = %self.ticker,
                listings = self.members.len(),
                percent,
                "Combined {} into a single {} entry with {percent}%",
                parts.join(" + "),
                self.ticker,
            );
        }
        let canonical = self.canonical();
        HoldingEntry {
            position: 0,
            company: canonical.company.clone(),
            ticker: self.ticker.clone(),
            percent,
            id: canonical.row_id.clone(),
        }
    }
}

/// Resolve, merge duplicate tickers, rank by weight and number positions from 1.
///
/// Ties keep page order. Total weight is conserved by the merge.
pub fn build_snapshot(
    mut rows: Vec<RawRow>,
    tickers: &TickerMap,
    timestamp: DateTime<Utc>,
) -> Snapshot {
    rows.sort_by_key(|r| r.ordinal);

    let mut groups: Vec<Group> = Vec::with_capacity(rows.len());
    let mut by_ticker: HashMap<String, usize> = HashMap::with_capacity(rows.len());

    for row in rows {
        let percent = parse_percent(&row.percent_text);
        let ticker = tickers.resolve(&row.company_name);
        // Unmapped names stand as their own listing.
        let listing = tickers
            .listing(&row.company_name)
            .unwrap_or(row.company_name.as_str());
        let is_primary_listing = listing == ticker;
        let member = Member {
            company: row.company_name,
            row_id: row.row_id,
            percent,
            is_primary_listing,
        };

        match by_ticker.get(&ticker) {
            Some(&idx) => groups[idx].members.push(member),
            None => {
                by_ticker.insert(ticker.clone(), groups.len());
                groups.push(Group {
                    ticker,
                    members: vec![member],
                });
            }
        }
    }

    let mut items: Vec<HoldingEntry> = groups.into_iter().map(Group::into_entry).collect();

    // sort_by is stable, so equal weights stay in first-seen order.
    items.sort_by(|a, b| b.percent.total_cmp(&a.percent));
    for (idx, item) in items.iter_mut().enumerate() {
        item.position = idx as u32 + 1;
    }

    Snapshot::new(timestamp, items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn rows(table: &[(&str, &str)]) -> Vec<RawRow> {
        table
            .iter()
            .enumerate()
            .map(|(i, (name, pct))| RawRow::new(*name, *pct, format!("row{i}"), i))
            .collect()
    }

    fn assert_ranked(snapshot: &Snapshot) {
        assert_eq!(snapshot.item_count, snapshot.items.len());
        for (i, item) in snapshot.items.iter().enumerate() {
            assert_eq!(item.position as usize, i + 1);
        }
        for pair in snapshot.items.windows(2) {
            assert!(pair[0].percent >= pair[1].percent, "{pair:?}");
        }
    }

    #[test]
    fn parse_percent_handles_suffix_and_garbage() {
        assert_eq!(parse_percent("8.75%"), 8.75);
        assert_eq!(parse_percent(" 3.0 % "), 3.0);
        assert_eq!(parse_percent("2"), 2.0);
        assert_eq!(parse_percent("n/a"), 0.0);
        assert_eq!(parse_percent(""), 0.0);
        assert_eq!(parse_percent("NaN%"), 0.0);
        assert_eq!(parse_percent("-1.5%"), 0.0);
    }

    #[test]
    fn alphabet_share_classes_merge_into_goog() {
        let map = TickerMap::builtin();
        let input = rows(&[
            ("Apple Inc", "8.0%"),
            ("Alphabet Inc Class A", "3.0%"),
            ("Alphabet Inc Class C", "2.0%"),
        ]);

        let snapshot = build_snapshot(input, &map, ts());

        let goog: Vec<_> = snapshot.items.iter().filter(|e| e.ticker == "GOOG").collect();
        assert_eq!(goog.len(), 1);
        assert!((goog[0].percent - 5.0).abs() < 1e-9);
        assert_eq!(goog[0].company, "Alphabet Inc Class C");
        assert_eq!(goog[0].id, "row2");
        assert!(snapshot.items.iter().all(|e| e.ticker != "GOOGL"));
        assert_eq!(snapshot.item_count, 2);
        assert_ranked(&snapshot);
    }

    #[test]
    fn merged_entry_is_reranked() {
        let map = TickerMap::builtin();
        let input = rows(&[
            ("Apple Inc", "4.0%"),
            ("Alphabet Inc Class A", "3.0%"),
            ("Alphabet Inc Class C", "2.0%"),
        ]);

        let snapshot = build_snapshot(input, &map, ts());

        assert_eq!(snapshot.items[0].ticker, "GOOG");
        assert_eq!(snapshot.items[0].position, 1);
        assert_eq!(snapshot.items[1].ticker, "AAPL");
        assert_eq!(snapshot.items[1].position, 2);
    }

    #[test]
    fn any_collision_merges_keeping_first_seen_member() {
        let map = TickerMap::default();
        let input = rows(&[
            ("Acme Corp", "1.5%"),
            ("Other Co", "2.0%"),
            ("Acme Corp", "1.0%"),
        ]);

        let snapshot = build_snapshot(input, &map, ts());

        assert_eq!(snapshot.item_count, 2);
        let acme = snapshot.items.iter().find(|e| e.ticker == "Acme Corp").unwrap();
        assert!((acme.percent - 2.5).abs() < 1e-9);
        assert_eq!(acme.id, "row0");
        assert_eq!(acme.position, 1);
    }

    #[test]
    fn row_named_after_merged_symbol_is_canonical() {
        let map = TickerMap::builtin();
        let input = vec![
            RawRow::new("Alphabet Inc Class A", "3.0%", "a", 0),
            RawRow::new("GOOG", "1.0%", "g", 1),
        ];

        let snapshot = build_snapshot(input, &map, ts());

        assert_eq!(snapshot.item_count, 1);
        let goog = &snapshot.items[0];
        assert_eq!(goog.ticker, "GOOG");
        assert!((goog.percent - 4.0).abs() < 1e-9);
        assert_eq!(goog.company, "GOOG");
        assert_eq!(goog.id, "g");
    }

    #[test]
    fn unmapped_company_keeps_name_as_ticker() {
        let map = TickerMap::builtin();
        let snapshot = build_snapshot(rows(&[("Unmapped Co", "1.0%")]), &map, ts());
        assert_eq!(snapshot.items[0].ticker, "Unmapped Co");
        assert_eq!(snapshot.items[0].company, "Unmapped Co");
    }

    #[test]
    fn malformed_percent_becomes_zero_without_aborting() {
        let map = TickerMap::builtin();
        let input = rows(&[("Apple Inc", "n/a"), ("Microsoft Corp", "7.1%")]);

        let snapshot = build_snapshot(input, &map, ts());

        assert_eq!(snapshot.item_count, 2);
        let apple = snapshot.items.iter().find(|e| e.ticker == "AAPL").unwrap();
        assert_eq!(apple.percent, 0.0);
        assert_eq!(apple.position, 2);
    }

    #[test]
    fn ties_keep_page_order() {
        let map = TickerMap::builtin();
        let input = rows(&[
            ("Tesla Inc", "2.0%"),
            ("Netflix Inc", "2.0%"),
            ("Apple Inc", "3.0%"),
            ("Intel Corp", "2.0%"),
        ]);

        let snapshot = build_snapshot(input, &map, ts());

        let tickers: Vec<&str> = snapshot.items.iter().map(|e| e.ticker.as_str()).collect();
        assert_eq!(tickers, ["AAPL", "TSLA", "NFLX", "INTC"]);
    }

    #[test]
    fn ordinal_defines_page_order_not_vec_order() {
        let map = TickerMap::builtin();
        let input = vec![
            RawRow::new("Netflix Inc", "2.0%", "b", 1),
            RawRow::new("Tesla Inc", "2.0%", "a", 0),
        ];

        let snapshot = build_snapshot(input, &map, ts());

        assert_eq!(snapshot.items[0].ticker, "TSLA");
        assert_eq!(snapshot.items[1].ticker, "NFLX");
    }

    #[test]
    fn weight_is_conserved_and_tickers_unique() {
        let map = TickerMap::builtin();
        let input = rows(&[
            ("Apple Inc", "8.81%"),
            ("Microsoft Corp", "8.02%"),
            ("Alphabet Inc Class A", "2.47%"),
            ("Unmapped Co", "0.33%"),
            ("Alphabet Inc Class C", "2.36%"),
            ("Broken Row", "--"),
            ("Unmapped Co", "0.10%"),
        ]);
        let expected: f64 = input.iter().map(|r| parse_percent(&r.percent_text)).sum();

        let snapshot = build_snapshot(input, &map, ts());

        assert!((snapshot.total_percent() - expected).abs() < 1e-9);
        let mut seen = std::collections::HashSet::new();
        for item in &snapshot.items {
            assert!(seen.insert(item.ticker.clone()), "duplicate {}", item.ticker);
        }
        assert_ranked(&snapshot);
    }

    #[test]
    fn deterministic_for_identical_input() {
        let map = TickerMap::builtin();
        let input = rows(&[
            ("Alphabet Inc Class C", "2.0%"),
            ("Apple Inc", "2.0%"),
            ("Alphabet Inc Class A", "1.0%"),
        ]);

        let a = build_snapshot(input.clone(), &map, ts());
        let b = build_snapshot(input, &map, ts());
        assert_eq!(a, b);
    }

    #[test]
    fn empty_input_gives_empty_snapshot() {
        let snapshot = build_snapshot(Vec::new(), &TickerMap::builtin(), ts());
        assert_eq!(snapshot.item_count, 0);
        assert!(snapshot.items.is_empty());
        assert_eq!(snapshot.timestamp, ts());
    }
}
