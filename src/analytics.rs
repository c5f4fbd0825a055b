//! Read-only reports over the aggregated record set.
//!
//! All grouping is by compact part code, the same key the index uses, so a
//! part spelled `"A 00018-089 09"` in one snapshot and `"A0001808909"` in
//! the next is one part here too. Non-numeric quantities are left out of
//! every sum and statistic.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::index::{history_series, StockIndex};
use crate::models::StockRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuantityChange {
    pub part_code: String,
    pub before: f64,
    pub after: f64,
    pub delta: f64,
}

/// Differences between two chronologically adjacent snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotDelta {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub new_codes: Vec<String>,
    pub removed_codes: Vec<String>,
    pub changed: Vec<QuantityChange>,
    /// Codes present in both with the same numeric total.
    pub unchanged: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuantityStats {
    /// Records with a numeric quantity.
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartHistory {
    pub part_code: String,
    pub entries: Vec<StockRecord>,
    /// `None` when no record has a numeric quantity.
    pub stats: Option<QuantityStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationChange {
    pub part_code: String,
    pub description: String,
    pub first_location: String,
    pub last_location: String,
    pub distinct_locations: usize,
    pub first_seen: NaiveDate,
    pub last_seen: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    /// Retained identities.
    pub items: usize,
    /// Raw aggregated rows across all snapshots.
    pub records: usize,
    pub total_quantity: f64,
    pub unique_codes: usize,
    pub unique_locations: usize,
    pub snapshots: usize,
    pub first_snapshot: Option<NaiveDate>,
    pub last_snapshot: Option<NaiveDate>,
}

/// Per snapshot date: compact code → (display code, numeric total).
fn totals_by_date(
    records: &[StockRecord],
) -> BTreeMap<NaiveDate, BTreeMap<String, (String, Option<f64>)>> {
    let mut out: BTreeMap<NaiveDate, BTreeMap<String, (String, Option<f64>)>> = BTreeMap::new();
    for r in records {
        let slot = out
            .entry(r.snapshot_date)
            .or_default()
            .entry(r.code_key())
            .or_insert_with(|| (r.normalized_part_code(), None));
        if let Some(q) = r.quantity_value() {
            slot.1 = Some(slot.1.unwrap_or(0.0) + q);
        }
    }
    out
}

pub fn snapshot_deltas(records: &[StockRecord]) -> Vec<SnapshotDelta> {
    let by_date = totals_by_date(records);
    let dates: Vec<&NaiveDate> = by_date.keys().collect();

    dates
        .windows(2)
        .map(|pair| {
            let (from, to) = (*pair[0], *pair[1]);
            let before = &by_date[&from];
            let after = &by_date[&to];

            let mut delta = SnapshotDelta {
                from,
                to,
                new_codes: Vec::new(),
                removed_codes: Vec::new(),
                changed: Vec::new(),
                unchanged: 0,
            };

            for (key, (code, qty_after)) in after {
                match before.get(key) {
                    None => delta.new_codes.push(code.clone()),
                    Some((_, qty_before)) => {
                        if let (Some(b), Some(a)) = (qty_before, qty_after) {
                            if a != b {
                                delta.changed.push(QuantityChange {
                                    part_code: code.clone(),
                                    before: *b,
                                    after: *a,
                                    delta: a - b,
                                });
                            } else {
                                delta.unchanged += 1;
                            }
                        }
                    }
                }
            }
            delta.removed_codes = before
                .iter()
                .filter(|(key, _)| !after.contains_key(*key))
                .map(|(_, (code, _))| code.clone())
                .collect();
            delta
        })
        .collect()
}

pub fn part_history(records: &[StockRecord], code: &str) -> Option<PartHistory> {
    let series = history_series(records, code);
    let first = series.first()?;

    let values: Vec<f64> = series.iter().filter_map(|r| r.quantity_value()).collect();
    let stats = if values.is_empty() {
        None
    } else {
        let sum: f64 = values.iter().sum();
        Some(QuantityStats {
            count: values.len(),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            mean: sum / values.len() as f64,
        })
    };

    Some(PartHistory {
        part_code: first.normalized_part_code(),
        entries: series.into_iter().cloned().collect(),
        stats,
    })
}

/// Parts whose set of locations is not the same in every snapshot.
pub fn location_changes(records: &[StockRecord]) -> Vec<LocationChange> {
    let mut by_code: BTreeMap<String, Vec<&StockRecord>> = BTreeMap::new();
    for r in records {
        by_code.entry(r.code_key()).or_default().push(r);
    }

    let mut out = Vec::new();
    for group in by_code.values_mut() {
        group.sort_by(|a, b| a.precedence().cmp(&b.precedence()));

        let mut per_date: BTreeMap<NaiveDate, BTreeSet<&str>> = BTreeMap::new();
        for r in group.iter().filter(|r| !r.location.is_empty()) {
            per_date
                .entry(r.snapshot_date)
                .or_default()
                .insert(r.location.as_str());
        }
        let distinct_sets: HashSet<&BTreeSet<&str>> = per_date.values().collect();
        if distinct_sets.len() < 2 {
            continue;
        }

        let all: BTreeSet<&str> = per_date.values().flatten().copied().collect();
        let join = |set: Option<&BTreeSet<&str>>| {
            set.map(|s| s.iter().copied().collect::<Vec<_>>().join(", "))
                .unwrap_or_default()
        };
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };

        out.push(LocationChange {
            part_code: last.normalized_part_code(),
            description: last.description.clone(),
            first_location: join(per_date.values().next()),
            last_location: join(per_date.values().next_back()),
            distinct_locations: all.len(),
            first_seen: first.snapshot_date,
            last_seen: last.snapshot_date,
        });
    }
    out
}

pub fn summary(index: &StockIndex, records: &[StockRecord]) -> Summary {
    let entries = index.entries();
    let dates: BTreeSet<NaiveDate> = records.iter().map(|r| r.snapshot_date).collect();
    let locations: HashSet<&str> = entries
        .iter()
        .map(|e| e.record.location.as_str())
        .filter(|l| !l.is_empty())
        .collect();

    Summary {
        items: entries.len(),
        records: records.len(),
        total_quantity: entries
            .iter()
            .filter_map(|e| e.record.quantity_value())
            .sum(),
        unique_codes: index.code_count(),
        unique_locations: locations.len(),
        snapshots: dates.len(),
        first_snapshot: dates.first().copied(),
        last_snapshot: dates.last().copied(),
    }
}
