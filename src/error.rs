//! Typed errors.
//!
//! [`LoadError`]s are per-file and never abort a reload: the aggregator
//! records the message against the file and moves on to the next
//! spreadsheet. [`InventoryError`]s travel inside `anyhow::Error` and are
//! recovered with `downcast_ref` where the HTTP layer needs a status code.

use std::path::PathBuf;

use thiserror::Error;

use crate::columns::CanonicalField;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("spreadsheet directory not found: {0}")]
    MissingDirectory(PathBuf),

    #[error("unreadable spreadsheet: {0}")]
    Unreadable(String),

    #[error("unsupported layout: {0}")]
    Unsupported(String),

    #[error("no header row found in the first {0} rows")]
    HeaderNotFound(usize),

    #[error("sheet has no data rows")]
    NoRows,

    #[error("missing required columns: {}", join_fields(.missing))]
    MissingColumns { missing: Vec<CanonicalField> },

    #[error("all loader strategies failed: {}", .attempts.join("; "))]
    AllStrategiesFailed { attempts: Vec<String> },
}

impl LoadError {
    pub fn unreadable(err: impl std::fmt::Display) -> Self {
        LoadError::Unreadable(err.to_string())
    }
}

/// Failures of the in-memory inventory as seen by callers.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("inventory not loaded yet")]
    NotLoaded,

    #[error("reload produced no records ({files} files listed, {skipped} skipped); previous data kept")]
    NoRecords { files: usize, skipped: usize },
}

fn join_fields(fields: &[CanonicalField]) -> String {
    fields
        .iter()
        .map(|f| f.label())
        .collect::<Vec<_>>()
        .join(", ")
}
