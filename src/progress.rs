//! Reload progress on stderr.
//!
//! A reload over a large directory can take a while, so `stk reload` reports
//! each phase as it goes: listing the directory, reading each spreadsheet and
//! building the index. Everything is written to stderr; stdout carries only
//! the final summary.

use serde::Serialize;
use std::io::Write;

use crate::stats::format_count;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ReloadProgressEvent {
    /// Listing the data directory.
    Discovering { dir: String },
    /// Reading spreadsheet `n` of `total`.
    Loading { file: String, n: u64, total: u64 },
    /// All files read; resolving conflicts over `records` rows.
    Indexing { records: u64 },
}

pub trait ReloadProgressReporter: Send + Sync {
    fn report(&self, event: ReloadProgressEvent);
}

/// `reload  loading  3 / 12  ESTOQUE120124.xlsx`
pub struct HumanProgress;

impl ReloadProgressReporter for HumanProgress {
    fn report(&self, event: ReloadProgressEvent) {
        let line = match event {
            ReloadProgressEvent::Discovering { dir } => format!("reload  listing {}", dir),
            ReloadProgressEvent::Loading { file, n, total } => format!(
                "reload  loading  {} / {}  {}",
                format_count(n),
                format_count(total),
                file
            ),
            ReloadProgressEvent::Indexing { records } => {
                format!("reload  indexing {} records", format_count(records))
            }
        };
        write_stderr_line(&line);
    }
}

/// One JSON object per event, tagged by `phase`.
pub struct JsonLinesProgress;

impl ReloadProgressReporter for JsonLinesProgress {
    fn report(&self, event: ReloadProgressEvent) {
        match serde_json::to_string(&event) {
            Ok(line) => write_stderr_line(&line),
            Err(e) => tracing::debug!(error = %e, "progress event not serializable"),
        }
    }
}

pub struct QuietProgress;

impl ReloadProgressReporter for QuietProgress {
    fn report(&self, _event: ReloadProgressEvent) {}
}

fn write_stderr_line(line: &str) {
    let mut err = std::io::stderr().lock();
    let _ = writeln!(err, "{}", line);
    let _ = err.flush();
}

/// `--progress` values.
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// `human` when stderr is a terminal, `off` otherwise.
    pub fn auto() -> Self {
        if atty::is(atty::Stream::Stderr) {
            Self::Human
        } else {
            Self::Off
        }
    }

    pub fn reporter(self) -> Box<dyn ReloadProgressReporter> {
        match self {
            Self::Off => Box::new(QuietProgress),
            Self::Human => Box::new(HumanProgress),
            Self::Json => Box::new(JsonLinesProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_phase_tag() {
        let json = serde_json::to_value(ReloadProgressEvent::Loading {
            file: "ESTOQUE150124.xlsx".to_string(),
            n: 2,
            total: 5,
        })
        .unwrap();
        assert_eq!(json["phase"], "loading");
        assert_eq!(json["file"], "ESTOQUE150124.xlsx");
        assert_eq!(json["total"], 5);

        let json = serde_json::to_value(ReloadProgressEvent::Indexing { records: 40 }).unwrap();
        assert_eq!(json["phase"], "indexing");
    }
}
