//! Core data models shared by the ingestion, index and search layers.
//!
//! A [`StockRecord`] is one spreadsheet row mapped onto the four canonical
//! fields and tagged with the snapshot it came from.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::sanitize::{compact_code, fold, normalize_part_code};

/// Where a snapshot date came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateOrigin {
    /// Parsed from a date pattern in the file name.
    FileName,
    /// No pattern in the name; the file's modification time was used.
    ModifiedTime,
    /// Neither was available; the load time was used.
    Now,
}

impl DateOrigin {
    pub fn label(&self) -> &'static str {
        match self {
            DateOrigin::FileName => "file name",
            DateOrigin::ModifiedTime => "modified time",
            DateOrigin::Now => "load time",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDate {
    pub date: NaiveDate,
    pub origin: DateOrigin,
}

/// One stock line as read from a snapshot spreadsheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRecord {
    pub part_code: String,
    pub description: String,
    /// Raw cell text; see [`StockRecord::quantity_value`].
    pub quantity: String,
    pub location: String,
    pub source_file: String,
    pub snapshot_date: NaiveDate,
    /// 1-based sheet row the record was read from.
    pub row: usize,
}

impl StockRecord {
    pub fn new(
        part_code: &str,
        description: &str,
        quantity: &str,
        location: &str,
        source_file: &str,
        snapshot_date: NaiveDate,
        row: usize,
    ) -> Self {
        Self {
            part_code: part_code.trim().to_string(),
            description: description.trim().to_string(),
            quantity: quantity.trim().to_string(),
            location: location.trim().to_string(),
            source_file: source_file.to_string(),
            snapshot_date,
            row,
        }
    }

    /// Uppercase part code with all whitespace removed.
    pub fn normalized_part_code(&self) -> String {
        normalize_part_code(&self.part_code)
    }

    /// Lookup key: the normalized code with separator punctuation removed.
    pub fn code_key(&self) -> String {
        compact_code(&self.part_code)
    }

    pub fn identity(&self) -> IdentityKey {
        IdentityKey {
            part_code: self.normalized_part_code(),
            description: fold(&self.description),
            location: fold(&self.location),
        }
    }

    /// Numeric quantity, or `None` when the cell text is not a number.
    pub fn quantity_value(&self) -> Option<f64> {
        parse_quantity(&self.quantity)
    }

    /// Total order used to pick the surviving record of an identity:
    /// newest snapshot, then the later file name, then the later row.
    pub fn precedence(&self) -> (NaiveDate, &str, usize) {
        (self.snapshot_date, self.source_file.as_str(), self.row)
    }
}

/// `(part_code, description, location)`: what makes two rows "the same"
/// stock line across snapshots. Quantity is deliberately excluded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityKey {
    pub part_code: String,
    pub description: String,
    pub location: String,
}

/// Parses quantity text such as `"8"`, `"8.0"`, `"1,5"` or `"1.234,5"`.
pub fn parse_quantity(text: &str) -> Option<f64> {
    let t = text.trim();
    if t.is_empty() {
        return None;
    }
    let candidate = if t.contains(',') {
        if t.contains('.') {
            // pt-BR thousands separator followed by decimal comma
            t.replace('.', "").replace(',', ".")
        } else {
            t.replace(',', ".")
        }
    } else {
        t.to_string()
    };
    candidate.parse::<f64>().ok().filter(|v| v.is_finite())
}
