//! # Stock Lookup
//!
//! Part lookup over a directory of warehouse stock spreadsheets.
//!
//! Each spreadsheet is one dated snapshot of stock (part code, description,
//! quantity, location). The pipeline reads every snapshot despite drifting
//! header layouts, keeps the most recent record per stock line, and serves
//! lookups by part code, description or location from an in-memory index.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Spreadsheets │──▶│ Sheet loader  │──▶│  Aggregator  │
//! │  (.xlsx ...) │   │ 3 strategies  │   │ per-file rpt │
//! └──────────────┘   └──────────────┘   └──────┬───────┘
//!                                              ▼
//!                    ┌──────────────┐   ┌──────────────┐
//!                    │  JSON cache  │◀──│ Index build  │
//!                    └──────────────┘   │ newest wins  │
//!                                       └──────┬───────┘
//!                          ┌───────────────────┤
//!                          ▼                   ▼
//!                     ┌──────────┐       ┌──────────┐
//!                     │   CLI    │       │   HTTP   │
//!                     │  (stk)   │       │  (axum)  │
//!                     └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! stk reload                    # read every spreadsheet, write the cache
//! stk search "A 00018-089 09"   # look up a part
//! stk serve                     # HTTP API with the daily reload
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Typed load and inventory errors |
//! | [`models`] | Stock records and snapshot dates |
//! | [`sanitize`] | Cell text, accent folding, part-code normalization |
//! | [`columns`] | Header normalization onto canonical fields |
//! | [`sheet`] | Spreadsheet reading strategies |
//! | [`snapshot`] | Snapshot dates from file names |
//! | [`files`] | Spreadsheet discovery |
//! | [`ingest`] | Record aggregation across files |
//! | [`index`] | Conflict resolution and the lookup index |
//! | [`search`] | Query matching |
//! | [`analytics`] | Deltas, history, location changes, summary |
//! | [`cache`] | On-disk cache of the last build |
//! | [`service`] | The owned, atomically swapped inventory |
//! | [`scheduler`] | Periodic reload task |
//! | [`server`] | HTTP API |
//! | [`progress`] | Reload progress on stderr |
//! | [`stats`] | CLI status and report printing |

pub mod analytics;
pub mod cache;
pub mod columns;
pub mod config;
pub mod error;
pub mod files;
pub mod index;
pub mod ingest;
pub mod models;
pub mod progress;
pub mod sanitize;
pub mod scheduler;
pub mod search;
pub mod server;
pub mod service;
pub mod sheet;
pub mod snapshot;
pub mod stats;

#[cfg(test)]
mod testutil;
