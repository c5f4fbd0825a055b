//! On-disk snapshot of the last successful build.
//!
//! One JSON document holding the aggregated records, the resolved index
//! entries and both build timestamps. Startup reads it to skip parsing
//! every spreadsheet; every successful rebuild rewrites it.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::index::IndexEntry;
use crate::ingest::FileReport;
use crate::models::StockRecord;

/// Format version. Bump when any serialized type changes shape so older
/// caches are rebuilt instead of misread.
pub const CACHE_VERSION: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheFile {
    #[serde(default)]
    pub version: u32,
    /// Fingerprint of the spreadsheet set the cache was built from.
    pub fingerprint: String,
    pub data_built_at: DateTime<Utc>,
    pub index_built_at: DateTime<Utc>,
    pub files: Vec<FileReport>,
    pub records: Vec<StockRecord>,
    pub entries: Vec<IndexEntry>,
}

#[derive(Debug)]
pub enum CacheOutcome {
    Hit(Box<CacheFile>),
    Missing,
    /// Present but unusable; the reason is logged and reported.
    Rejected(String),
}

/// Reads the cache at `path`. With `expected_fingerprint` set, a cache built
/// from a different spreadsheet set is rejected.
pub fn load_cache(path: &Path, expected_fingerprint: Option<&str>) -> CacheOutcome {
    if !path.exists() {
        return CacheOutcome::Missing;
    }

    let cache = match read_cache(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cache unreadable");
            return CacheOutcome::Rejected(format!("{:#}", e));
        }
    };

    if cache.version != CACHE_VERSION {
        let reason = format!(
            "cache version {} does not match {}",
            cache.version, CACHE_VERSION
        );
        tracing::warn!(path = %path.display(), "{}", reason);
        return CacheOutcome::Rejected(reason);
    }
    if let Some(expected) = expected_fingerprint {
        if cache.fingerprint != expected {
            let reason = "spreadsheets changed since the cache was written".to_string();
            tracing::warn!(path = %path.display(), "{}", reason);
            return CacheOutcome::Rejected(reason);
        }
    }
    if cache.records.is_empty() {
        return CacheOutcome::Rejected("cache holds no records".to_string());
    }

    tracing::info!(
        path = %path.display(),
        records = cache.records.len(),
        items = cache.entries.len(),
        built = %cache.data_built_at,
        "cache hit"
    );
    CacheOutcome::Hit(Box::new(cache))
}

fn read_cache(path: &Path) -> Result<CacheFile> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read cache: {}", path.display()))?;
    let cache: CacheFile = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse cache: {}", path.display()))?;
    Ok(cache)
}

/// Writes through a sibling temp file and a rename, so readers never see a
/// half-written cache.
pub fn write_cache(path: &Path, cache: &CacheFile) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create cache dir: {}", parent.display()))?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    let contents = serde_json::to_vec(cache)?;
    fs::write(&tmp, contents)
        .with_context(|| format!("Failed to write cache: {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace cache: {}", path.display()))?;

    tracing::info!(path = %path.display(), records = cache.records.len(), "cache written");
    Ok(())
}
