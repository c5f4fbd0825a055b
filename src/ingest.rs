//! Record aggregation.
//!
//! Turns a directory of snapshot spreadsheets into one flat list of
//! [`StockRecord`]s: list → load each sheet → map rows onto the canonical
//! fields → drop header leakage. A file that cannot be loaded is reported
//! and skipped; it never aborts the batch.

use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::columns::CanonicalField;
use crate::config::DataConfig;
use crate::files::{fingerprint, list_spreadsheets, SpreadsheetFile};
use crate::models::{SnapshotDate, StockRecord};
use crate::progress::{QuietProgress, ReloadProgressEvent, ReloadProgressReporter};
use crate::sanitize::{is_header_artifact, safe_string};
use crate::sheet::{default_strategies, load_sheet, LoadedSheet};

/// Outcome of loading one spreadsheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReport {
    pub file: String,
    pub snapshot: SnapshotDate,
    #[serde(flatten)]
    pub status: FileStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    Loaded {
        strategy: String,
        records: usize,
        /// Rows with an empty part code.
        skipped_rows: usize,
        /// Rows whose part code looked like header or title text.
        dropped_artifacts: usize,
    },
    Skipped {
        reason: String,
    },
}

impl FileReport {
    pub fn is_loaded(&self) -> bool {
        matches!(self.status, FileStatus::Loaded { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub records: Vec<StockRecord>,
    pub files: Vec<FileReport>,
    /// Fingerprint of the listed spreadsheet set (see [`fingerprint`]).
    pub fingerprint: String,
}

pub fn aggregate(data: &DataConfig) -> Result<Aggregation> {
    aggregate_with_progress(data, &QuietProgress)
}

pub fn aggregate_with_progress(
    data: &DataConfig,
    progress: &dyn ReloadProgressReporter,
) -> Result<Aggregation> {
    progress.report(ReloadProgressEvent::Discovering {
        dir: data.dir.display().to_string(),
    });
    let files = list_spreadsheets(data)?;
    Ok(aggregate_files(&files, data.header_row, progress))
}

/// Loads every listed file. Never fails: unloadable files become
/// [`FileStatus::Skipped`] entries.
pub fn aggregate_files(
    files: &[SpreadsheetFile],
    header_row: usize,
    progress: &dyn ReloadProgressReporter,
) -> Aggregation {
    let strategies = default_strategies(header_row);
    let total = files.len() as u64;
    let mut out = Aggregation {
        fingerprint: fingerprint(files),
        ..Default::default()
    };

    for (i, file) in files.iter().enumerate() {
        progress.report(ReloadProgressEvent::Loading {
            file: file.name.clone(),
            n: i as u64 + 1,
            total,
        });

        let status = match load_sheet(&file.path, &strategies) {
            Ok(sheet) => {
                let rows = sheet_records(&sheet, &file.name, file.snapshot.date);
                tracing::info!(
                    file = %file.name,
                    strategy = sheet.strategy,
                    records = rows.records.len(),
                    skipped_rows = rows.skipped_rows,
                    dropped_artifacts = rows.dropped_artifacts,
                    snapshot = %file.snapshot.date,
                    date_from = file.snapshot.origin.label(),
                    "spreadsheet loaded"
                );
                let status = FileStatus::Loaded {
                    strategy: sheet.strategy.to_string(),
                    records: rows.records.len(),
                    skipped_rows: rows.skipped_rows,
                    dropped_artifacts: rows.dropped_artifacts,
                };
                out.records.extend(rows.records);
                status
            }
            Err(err) => {
                tracing::warn!(file = %file.name, reason = %err, "spreadsheet skipped");
                FileStatus::Skipped {
                    reason: err.to_string(),
                }
            }
        };

        out.files.push(FileReport {
            file: file.name.clone(),
            snapshot: file.snapshot,
            status,
        });
    }

    out
}

pub(crate) struct SheetRecords {
    pub records: Vec<StockRecord>,
    pub skipped_rows: usize,
    pub dropped_artifacts: usize,
}

/// Maps loaded rows onto records for one snapshot file.
pub(crate) fn sheet_records(
    sheet: &LoadedSheet,
    source_file: &str,
    snapshot_date: NaiveDate,
) -> SheetRecords {
    let mut out = SheetRecords {
        records: Vec::with_capacity(sheet.table.rows.len()),
        skipped_rows: 0,
        dropped_artifacts: 0,
    };
    let text = |row: &crate::sheet::Row, field: CanonicalField| -> String {
        sheet
            .columns
            .get(field)
            .map(|col| safe_string(row.cell(col)))
            .unwrap_or_default()
    };

    for row in &sheet.table.rows {
        let code = text(row, CanonicalField::PartCode);
        if code.is_empty() {
            out.skipped_rows += 1;
            continue;
        }
        if is_header_artifact(&code) {
            out.dropped_artifacts += 1;
            continue;
        }
        out.records.push(StockRecord::new(
            &code,
            &text(row, CanonicalField::Description),
            &text(row, CanonicalField::Quantity),
            &text(row, CanonicalField::Location),
            source_file,
            snapshot_date,
            row.number,
        ));
    }
    out
}
