//! The owned inventory.
//!
//! [`Inventory`] holds the currently served [`Generation`] behind an
//! `RwLock<Option<Arc<_>>>`. Readers clone the `Arc` and release the lock
//! at once, so a search always runs against one complete generation. A
//! reload builds the next generation without touching that lock and only
//! takes the write side to swap the pointer. Reloads are serialized by a
//! separate mutex.
//!
//! A reload that yields zero records is rejected: the previous generation
//! keeps serving and the error is kept for [`Inventory::status`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::analytics::{self, LocationChange, PartHistory, SnapshotDelta, Summary};
use crate::cache::{load_cache, write_cache, CacheFile, CacheOutcome, CACHE_VERSION};
use crate::config::Config;
use crate::error::InventoryError;
use crate::files::{fingerprint, list_spreadsheets, SpreadsheetFile};
use crate::index::{build_index, history_series, StockIndex};
use crate::ingest::{aggregate_with_progress, FileReport};
use crate::models::StockRecord;
use crate::progress::{QuietProgress, ReloadProgressEvent, ReloadProgressReporter};
use crate::search::{self, SearchResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Spreadsheets,
    Cache,
}

/// One immutable, fully built state of the inventory.
#[derive(Debug)]
pub struct Generation {
    pub id: u64,
    pub records: Vec<StockRecord>,
    pub index: StockIndex,
    pub files: Vec<FileReport>,
    pub fingerprint: String,
    pub data_built_at: DateTime<Utc>,
    pub source: DataSource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReloadSummary {
    pub generation: u64,
    pub records: usize,
    pub items: usize,
    pub files_loaded: usize,
    pub files_skipped: usize,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct InventoryStatus {
    pub loaded: bool,
    pub generation: Option<u64>,
    pub item_count: usize,
    pub record_count: usize,
    pub code_count: usize,
    pub file_count: usize,
    pub data_built_at: Option<DateTime<Utc>>,
    pub index_built_at: Option<DateTime<Utc>>,
    pub source: Option<DataSource>,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub files: Vec<FileReport>,
}

/// Raw rows for one part code, grouped by the file they came from.
#[derive(Debug, Clone, Serialize)]
pub struct PartOccurrences {
    pub part_code: String,
    pub total: usize,
    pub files: Vec<FileOccurrences>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileOccurrences {
    pub file: String,
    pub snapshot_date: NaiveDate,
    pub rows: Vec<StockRecord>,
}

#[derive(Default)]
struct State {
    current: Option<Arc<Generation>>,
    last_attempt: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

pub struct Inventory {
    config: Config,
    state: RwLock<State>,
    rebuild: Mutex<()>,
    next_id: AtomicU64,
}

impl Inventory {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: RwLock::new(State::default()),
            rebuild: Mutex::new(()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Serves the cache when it is usable, otherwise rebuilds from the
    /// spreadsheets.
    pub fn startup(&self) -> Result<()> {
        if self.load_from_cache()? {
            return Ok(());
        }
        self.reload().map(|_| ())
    }

    /// Installs the cached generation. `Ok(false)` when caching is off or
    /// the cache is missing or rejected.
    pub fn load_from_cache(&self) -> Result<bool> {
        let Some(path) = self.config.cache.path.as_deref() else {
            return Ok(false);
        };

        let expected = if self.config.cache.verify_sources {
            match list_spreadsheets(&self.config.data) {
                Ok(files) => Some(fingerprint(&files)),
                Err(e) => {
                    tracing::warn!(error = %e, "cannot list spreadsheets; cache used unverified");
                    None
                }
            }
        } else {
            None
        };

        let cache = match load_cache(path, expected.as_deref()) {
            CacheOutcome::Hit(cache) => *cache,
            CacheOutcome::Missing | CacheOutcome::Rejected(_) => return Ok(false),
        };

        let index = StockIndex::from_entries(cache.entries, cache.index_built_at);
        self.swap(Generation {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            records: cache.records,
            index,
            files: cache.files,
            fingerprint: cache.fingerprint,
            data_built_at: cache.data_built_at,
            source: DataSource::Cache,
        });
        Ok(true)
    }

    pub fn reload(&self) -> Result<ReloadSummary> {
        self.reload_with_progress(&QuietProgress)
    }

    /// Full rebuild from the spreadsheets, then an atomic swap.
    pub fn reload_with_progress(
        &self,
        progress: &dyn ReloadProgressReporter,
    ) -> Result<ReloadSummary> {
        let _guard = self.rebuild.lock().unwrap_or_else(PoisonError::into_inner);
        let started = Instant::now();

        let outcome = self.build_generation(progress);
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.last_attempt = Some(Utc::now());

        let generation = match outcome {
            Ok(g) => g,
            Err(e) => {
                tracing::error!(error = %format!("{:#}", e), "reload rejected; previous data kept");
                state.last_error = Some(format!("{:#}", e));
                return Err(e);
            }
        };

        let summary = ReloadSummary {
            generation: generation.id,
            records: generation.records.len(),
            items: generation.index.len(),
            files_loaded: generation.files.iter().filter(|f| f.is_loaded()).count(),
            files_skipped: generation.files.iter().filter(|f| !f.is_loaded()).count(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        state.current = Some(Arc::new(generation));
        state.last_error = None;
        drop(state);

        tracing::info!(
            generation = summary.generation,
            records = summary.records,
            items = summary.items,
            files = summary.files_loaded,
            skipped = summary.files_skipped,
            elapsed_ms = summary.elapsed_ms,
            "reload complete"
        );
        Ok(summary)
    }

    fn build_generation(&self, progress: &dyn ReloadProgressReporter) -> Result<Generation> {
        let aggregation = aggregate_with_progress(&self.config.data, progress)?;
        if aggregation.records.is_empty() {
            return Err(InventoryError::NoRecords {
                files: aggregation.files.len(),
                skipped: aggregation.files.iter().filter(|f| !f.is_loaded()).count(),
            }
            .into());
        }

        progress.report(ReloadProgressEvent::Indexing {
            records: aggregation.records.len() as u64,
        });
        let index = build_index(&aggregation.records);
        let generation = Generation {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            records: aggregation.records,
            index,
            files: aggregation.files,
            fingerprint: aggregation.fingerprint,
            data_built_at: Utc::now(),
            source: DataSource::Spreadsheets,
        };

        if let Some(path) = self.config.cache.path.as_deref() {
            let cache = CacheFile {
                version: CACHE_VERSION,
                fingerprint: generation.fingerprint.clone(),
                data_built_at: generation.data_built_at,
                index_built_at: generation.index.built_at(),
                files: generation.files.clone(),
                records: generation.records.clone(),
                entries: generation.index.entries().to_vec(),
            };
            if let Err(e) = write_cache(path, &cache) {
                tracing::warn!(error = %format!("{:#}", e), "cache write failed");
            }
        }
        Ok(generation)
    }

    /// Replaces the served generation.
    pub fn swap(&self, generation: Generation) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.current = Some(Arc::new(generation));
    }

    pub fn current(&self) -> Option<Arc<Generation>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .current
            .clone()
    }

    fn require(&self) -> Result<Arc<Generation>> {
        self.current()
            .ok_or_else(|| InventoryError::NotLoaded.into())
    }

    pub fn is_loaded(&self) -> bool {
        self.current().is_some()
    }

    /// Searches the current generation. `limit` defaults to
    /// `retrieval.final_limit` and may not exceed it. A blank query is
    /// answered even before the first load.
    pub fn search(&self, query: &str, limit: Option<usize>) -> Result<SearchResponse> {
        if limit != Some(0) && search::normalize_query(query).is_empty() {
            return Ok(SearchResponse::blank(query));
        }
        let generation = self.require()?;
        let cap = self.config.retrieval.final_limit;
        let limit = limit.map(|l| l.min(cap)).unwrap_or(cap);
        search::search(&generation.index, query, limit)
    }

    pub fn status(&self) -> InventoryStatus {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let current = state.current.as_deref();
        InventoryStatus {
            loaded: current.is_some(),
            generation: current.map(|g| g.id),
            item_count: current.map(|g| g.index.len()).unwrap_or(0),
            record_count: current.map(|g| g.records.len()).unwrap_or(0),
            code_count: current.map(|g| g.index.code_count()).unwrap_or(0),
            file_count: current
                .map(|g| g.files.iter().filter(|f| f.is_loaded()).count())
                .unwrap_or(0),
            data_built_at: current.map(|g| g.data_built_at),
            index_built_at: current.map(|g| g.index.built_at()),
            source: current.map(|g| g.source),
            last_attempt: state.last_attempt,
            last_error: state.last_error.clone(),
            files: current.map(|g| g.files.clone()).unwrap_or_default(),
        }
    }

    pub fn part_occurrences(&self, code: &str) -> Result<PartOccurrences> {
        let generation = self.require()?;
        let series = history_series(&generation.records, code);

        let mut files: Vec<FileOccurrences> = Vec::new();
        for r in &series {
            match files.iter_mut().find(|f| f.file == r.source_file) {
                Some(f) => f.rows.push((*r).clone()),
                None => files.push(FileOccurrences {
                    file: r.source_file.clone(),
                    snapshot_date: r.snapshot_date,
                    rows: vec![(*r).clone()],
                }),
            }
        }

        Ok(PartOccurrences {
            part_code: crate::sanitize::normalize_part_code(code),
            total: series.len(),
            files,
        })
    }

    pub fn summary(&self) -> Result<Summary> {
        let g = self.require()?;
        Ok(analytics::summary(&g.index, &g.records))
    }

    pub fn deltas(&self) -> Result<Vec<SnapshotDelta>> {
        let g = self.require()?;
        Ok(analytics::snapshot_deltas(&g.records))
    }

    pub fn history(&self, code: &str) -> Result<Option<PartHistory>> {
        let g = self.require()?;
        Ok(analytics::part_history(&g.records, code))
    }

    pub fn location_changes(&self) -> Result<Vec<LocationChange>> {
        let g = self.require()?;
        Ok(analytics::location_changes(&g.records))
    }

    pub fn files(&self) -> Result<Vec<SpreadsheetFile>> {
        list_spreadsheets(&self.config.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{stock_sheet, write_xlsx};
    use tempfile::TempDir;

    fn inventory_with(rows: &[(&str, [&str; 4])]) -> (TempDir, Inventory) {
        let tmp = TempDir::new().unwrap();
        for (file, row) in rows {
            write_xlsx(&tmp.path().join(file), &stock_sheet(&[*row]));
        }
        let inv = Inventory::new(Config::for_data_dir(tmp.path()));
        (tmp, inv)
    }

    #[test]
    fn search_before_load_is_not_loaded() {
        let (_tmp, inv) = inventory_with(&[]);
        let err = inv.search("X", None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InventoryError>(),
            Some(InventoryError::NotLoaded)
        ));
        assert!(!inv.status().loaded);
    }

    #[test]
    fn reload_then_search() {
        let (_tmp, inv) = inventory_with(&[
            ("ESTOQUE120124.xlsx", ["X123", "Filtro", "5", "A1"]),
            ("ESTOQUE150124.xlsx", ["X123", "Filtro", "8", "A1"]),
        ]);
        let summary = inv.reload().unwrap();
        assert_eq!(summary.records, 2);
        assert_eq!(summary.items, 1);
        assert_eq!(summary.files_loaded, 2);

        let resp = inv.search("X123", None).unwrap();
        assert_eq!(resp.total, 1);
        assert_eq!(resp.results[0].record.quantity, "8");

        let status = inv.status();
        assert!(status.loaded);
        assert_eq!(status.source, Some(DataSource::Spreadsheets));
        assert_eq!(status.file_count, 2);
        assert!(status.last_error.is_none());
    }

    #[test]
    fn empty_reload_keeps_previous_generation() {
        let (tmp, inv) = inventory_with(&[("ESTOQUE150124.xlsx", ["X1", "d", "1", "L"])]);
        let first = inv.reload().unwrap();

        std::fs::remove_file(tmp.path().join("ESTOQUE150124.xlsx")).unwrap();
        let err = inv.reload().unwrap_err();
        assert!(err.downcast_ref::<InventoryError>().is_some());

        let status = inv.status();
        assert_eq!(status.generation, Some(first.generation));
        assert!(status.last_error.is_some());
        assert_eq!(inv.search("X1", None).unwrap().total, 1);
    }

    #[test]
    fn limit_is_clamped_to_config() {
        let (_tmp, inv) = inventory_with(&[("ESTOQUE150124.xlsx", ["X1", "d", "1", "L"])]);
        inv.reload().unwrap();
        assert!(inv.search("X1", Some(0)).is_err());
        assert_eq!(inv.search("X1", Some(500)).unwrap().total, 1);
    }

    #[test]
    fn occurrences_grouped_by_file() {
        let (_tmp, inv) = inventory_with(&[
            ("ESTOQUE120124.xlsx", ["X-1", "Filtro", "5", "A1"]),
            ("ESTOQUE150124.xlsx", ["X1", "Filtro", "8", "B1"]),
        ]);
        inv.reload().unwrap();
        let occ = inv.part_occurrences("x1").unwrap();
        assert_eq!(occ.total, 2);
        assert_eq!(occ.files.len(), 2);
        assert_eq!(occ.files[0].file, "ESTOQUE120124.xlsx");
    }

    #[test]
    fn cache_round_trip() {
        let (tmp, _) = inventory_with(&[("ESTOQUE150124.xlsx", ["X1", "d", "3", "L"])]);
        let mut config = Config::for_data_dir(tmp.path());
        config.cache.path = Some(tmp.path().join("cache.json"));

        let writer = Inventory::new(config.clone());
        writer.reload().unwrap();

        let reader = Inventory::new(config);
        assert!(reader.load_from_cache().unwrap());
        assert_eq!(reader.status().source, Some(DataSource::Cache));
        assert_eq!(reader.search("X1", None).unwrap().results[0].record.quantity, "3");
    }

    #[test]
    fn stale_cache_triggers_rebuild() {
        let (tmp, _) = inventory_with(&[("ESTOQUE150124.xlsx", ["X1", "d", "3", "L"])]);
        let mut config = Config::for_data_dir(tmp.path());
        config.cache.path = Some(tmp.path().join("cache.json"));
        Inventory::new(config.clone()).reload().unwrap();

        write_xlsx(
            &tmp.path().join("ESTOQUE160124.xlsx"),
            &stock_sheet(&[["X1", "d", "4", "L"]]),
        );
        let inv = Inventory::new(config);
        inv.startup().unwrap();
        assert_eq!(inv.status().source, Some(DataSource::Spreadsheets));
        assert_eq!(inv.search("X1", None).unwrap().results[0].record.quantity, "4");
    }
}
