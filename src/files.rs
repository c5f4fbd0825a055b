//! Spreadsheet discovery.
//!
//! Lists the top level of the data directory, keeps names matching the
//! include globs and not the exclude globs, and skips the `~$` lock files
//! that office suites leave next to open workbooks.

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use walkdir::WalkDir;

use crate::config::DataConfig;
use crate::error::LoadError;
use crate::models::SnapshotDate;
use crate::snapshot::snapshot_date_for;
use crate::stats::{format_bytes, format_ts_relative};

#[derive(Debug, Clone, Serialize)]
pub struct SpreadsheetFile {
    pub name: String,
    #[serde(skip)]
    pub path: PathBuf,
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub snapshot: SnapshotDate,
}

/// Matching spreadsheets sorted by file name.
pub fn list_spreadsheets(data: &DataConfig) -> Result<Vec<SpreadsheetFile>> {
    let root = &data.dir;
    if !root.is_dir() {
        return Err(LoadError::MissingDirectory(root.clone()).into());
    }

    let include_set = build_globset(&data.include_globs)?;
    let mut excludes = vec!["~$*".to_string(), ".~lock.*".to_string()];
    excludes.extend(data.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let now = Local::now();
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(data.follow_symlinks);
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if exclude_set.is_match(&name) || !include_set.is_match(&name) {
            continue;
        }

        let metadata = entry.metadata()?;
        let modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| DateTime::<Utc>::from(std::time::UNIX_EPOCH));

        files.push(SpreadsheetFile {
            snapshot: snapshot_date_for(entry.path(), now),
            name,
            path: entry.path().to_path_buf(),
            size: metadata.len(),
            modified,
        });
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

/// SHA-256 over (name, size, mtime) of each file. Changes whenever a file
/// is added, removed, replaced or touched.
pub fn fingerprint(files: &[SpreadsheetFile]) -> String {
    let mut hasher = Sha256::new();
    for f in files {
        hasher.update(f.name.as_bytes());
        hasher.update([0u8]);
        hasher.update(f.size.to_le_bytes());
        hasher.update(f.modified.timestamp().to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Case-insensitive so `ESTOQUE.XLSX` matches `*.xlsx`.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(
            GlobBuilder::new(pattern)
                .case_insensitive(true)
                .literal_separator(true)
                .build()?,
        );
    }
    Ok(builder.build()?)
}

pub fn print_files(files: &[SpreadsheetFile]) {
    if files.is_empty() {
        println!("No spreadsheets found.");
        return;
    }
    println!(
        "{:<32} {:>10}  {:<10}  {:<14}  MODIFIED",
        "FILE", "SIZE", "SNAPSHOT", "DATE FROM"
    );
    for f in files {
        println!(
            "{:<32} {:>10}  {:<10}  {:<14}  {}",
            f.name,
            format_bytes(f.size),
            f.snapshot.date.format("%Y-%m-%d"),
            f.snapshot.origin.label(),
            format_ts_relative(f.modified.timestamp()),
        );
    }
}
