//! Conflict resolution and the lookup index.
//!
//! Records are grouped by [`IdentityKey`]; each group keeps the record with
//! the greatest [`StockRecord::precedence`] (newest snapshot, then the later
//! file name, then the later row). The survivors are indexed by compact
//! part code, one code mapping to every location it is stocked at.
//!
//! An index is immutable once built. Reloads build a new one.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{parse_quantity, IdentityKey, StockRecord};
use crate::sanitize::{compact_code, fold};

/// A retained record plus what the other snapshots said about its identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    #[serde(flatten)]
    pub record: StockRecord,
    /// Earliest snapshot containing this identity.
    pub first_seen: NaiveDate,
    /// Snapshot at which the quantity took its current value.
    pub last_changed: NaiveDate,
    /// Raw rows folded into this entry.
    pub occurrences: usize,
}

/// Precomputed match keys for one entry, aligned with `entries`.
#[derive(Debug, Clone)]
pub(crate) struct EntryKeys {
    pub code: String,
    pub description: String,
    pub location: String,
}

impl EntryKeys {
    fn of(record: &StockRecord) -> Self {
        Self {
            code: compact_code(&record.part_code).to_lowercase(),
            description: strip_whitespace(&fold(&record.description)),
            location: strip_whitespace(&fold(&record.location)),
        }
    }
}

pub(crate) fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

#[derive(Debug, Clone)]
pub struct StockIndex {
    entries: Vec<IndexEntry>,
    keys: Vec<EntryKeys>,
    by_code: HashMap<String, Vec<usize>>,
    built_at: DateTime<Utc>,
}

impl StockIndex {
    /// Rebuilds lookup structures around already-resolved entries, e.g. ones
    /// read back from the cache.
    pub fn from_entries(entries: Vec<IndexEntry>, built_at: DateTime<Utc>) -> Self {
        let keys: Vec<EntryKeys> = entries.iter().map(|e| EntryKeys::of(&e.record)).collect();
        let mut by_code: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, k) in keys.iter().enumerate() {
            by_code.entry(k.code.clone()).or_default().push(i);
        }
        Self {
            entries,
            keys,
            by_code,
            built_at,
        }
    }

    /// Entries in identity first-encounter order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub(crate) fn keys(&self) -> &[EntryKeys] {
        &self.keys
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct compact part codes.
    pub fn code_count(&self) -> usize {
        self.by_code.len()
    }

    /// Entries whose compact code equals that of `code`.
    pub fn lookup(&self, code: &str) -> Vec<&IndexEntry> {
        self.lookup_key(&compact_code(code).to_lowercase())
    }

    pub(crate) fn lookup_key(&self, key: &str) -> Vec<&IndexEntry> {
        self.by_code
            .get(key)
            .map(|idx| idx.iter().map(|&i| &self.entries[i]).collect())
            .unwrap_or_default()
    }

    pub(crate) fn positions_for_key(&self, key: &str) -> Option<&[usize]> {
        self.by_code.get(key).map(Vec::as_slice)
    }
}

/// Resolves conflicts and indexes the survivors.
pub fn build_index(records: &[StockRecord]) -> StockIndex {
    let mut groups: Vec<Vec<&StockRecord>> = Vec::new();
    let mut slot_of: HashMap<IdentityKey, usize> = HashMap::new();

    for record in records {
        let slot = *slot_of.entry(record.identity()).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(record);
    }

    let entries = groups.into_iter().filter_map(resolve_group).collect();
    StockIndex::from_entries(entries, Utc::now())
}

fn resolve_group(mut group: Vec<&StockRecord>) -> Option<IndexEntry> {
    group.sort_by(|a, b| a.precedence().cmp(&b.precedence()));
    let winner = *group.last()?;

    let first_seen = group.iter().map(|r| r.snapshot_date).min()?;
    let last_changed = group
        .iter()
        .rev()
        .take_while(|r| same_quantity(&r.quantity, &winner.quantity))
        .map(|r| r.snapshot_date)
        .last()
        .unwrap_or(winner.snapshot_date);

    Some(IndexEntry {
        record: winner.clone(),
        first_seen,
        last_changed,
        occurrences: group.len(),
    })
}

/// Numeric comparison when both sides parse, so `"8"` equals `"8.0"`.
fn same_quantity(a: &str, b: &str) -> bool {
    match (parse_quantity(a), parse_quantity(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a.trim() == b.trim(),
    }
}

/// Every raw record sharing `code`'s compact form, oldest first.
pub fn history_series<'a>(records: &'a [StockRecord], code: &str) -> Vec<&'a StockRecord> {
    let key = compact_code(code);
    let mut series: Vec<&StockRecord> = records.iter().filter(|r| r.code_key() == key).collect();
    series.sort_by(|a, b| a.precedence().cmp(&b.precedence()));
    series
}
