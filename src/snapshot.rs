//! Snapshot date inference from spreadsheet file names.
//!
//! The export convention is a bare `DDMMYY` run (`ESTOQUE120124.xlsx` is
//! 12 Jan 2024). Looser spellings are accepted as a fallback, and files with
//! no date in their name take their modification time, then the load time.

use std::path::Path;

use chrono::{DateTime, Datelike, Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{DateOrigin, SnapshotDate};

static DDMMYY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\D)(\d{2})(\d{2})(\d{2})(?:\D|$)").unwrap());
static DDMMYYYY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\D)(\d{2})(\d{2})(\d{4})(?:\D|$)").unwrap());
static SEPARATED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\D)(\d{1,2})[-._ ](\d{1,2})[-._ ](\d{4}|\d{2})(?:\D|$)").unwrap()
});
static DAY_MONTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\D)(\d{1,2})[-._](\d{1,2})(?:\D|$)").unwrap());

/// Date encoded in a file name, if any. `fallback_year` fills in the year
/// for `DD-MM` names.
pub fn extract_snapshot_date(file_name: &str, fallback_year: i32) -> Option<NaiveDate> {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);

    for re in [&*DDMMYY, &*DDMMYYYY, &*SEPARATED] {
        for caps in re.captures_iter(stem) {
            if let Some(date) = ymd(&caps[3], &caps[2], &caps[1]) {
                return Some(date);
            }
        }
    }

    DAY_MONTH.captures_iter(stem).find_map(|caps| {
        let day = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        NaiveDate::from_ymd_opt(fallback_year, month, day)
    })
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    let mut y: i32 = year.parse().ok()?;
    if year.len() == 2 {
        y += 2000;
    }
    NaiveDate::from_ymd_opt(y, month.parse().ok()?, day.parse().ok()?)
}

/// Snapshot date for a file on disk, recording where the date came from.
pub fn snapshot_date_for(path: &Path, now: DateTime<Local>) -> SnapshotDate {
    let modified: Option<DateTime<Local>> = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::from);
    let fallback_year = modified.unwrap_or(now).year();

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if let Some(date) = extract_snapshot_date(&name, fallback_year) {
        return SnapshotDate {
            date,
            origin: DateOrigin::FileName,
        };
    }
    match modified {
        Some(m) => SnapshotDate {
            date: m.date_naive(),
            origin: DateOrigin::ModifiedTime,
        },
        None => SnapshotDate {
            date: now.date_naive(),
            origin: DateOrigin::Now,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn ddmmyy_in_name() {
        assert_eq!(extract_snapshot_date("ESTOQUE120124.xlsx", 1999), Some(date(2024, 1, 12)));
        assert_eq!(extract_snapshot_date("ESTOQUE150124.xlsx", 1999), Some(date(2024, 1, 15)));
        assert_eq!(extract_snapshot_date("310523 posicao.xls", 1999), Some(date(2023, 5, 31)));
    }

    #[test]
    fn looser_patterns() {
        assert_eq!(extract_snapshot_date("estoque_12012024.xlsx", 1999), Some(date(2024, 1, 12)));
        assert_eq!(extract_snapshot_date("estoque 12-01-2024.xlsx", 1999), Some(date(2024, 1, 12)));
        assert_eq!(extract_snapshot_date("estoque 1.2.24.xlsx", 1999), Some(date(2024, 2, 1)));
        assert_eq!(extract_snapshot_date("estoque 12-01.xlsx", 2023), Some(date(2023, 1, 12)));
    }

    #[test]
    fn invalid_runs_are_skipped() {
        assert_eq!(extract_snapshot_date("ESTOQUE991399.xlsx", 2024), None);
        assert_eq!(extract_snapshot_date("lote 123 - 321999.xlsx", 2024), None);
        assert_eq!(extract_snapshot_date("estoque.xlsx", 2024), None);
        // the extension never contributes digits
        assert_eq!(extract_snapshot_date("estoque.12", 2024), None);
    }

    #[test]
    fn undated_file_uses_modified_time() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("estoque.xlsx");
        std::fs::write(&path, b"x").unwrap();

        let now = Local::now();
        let snap = snapshot_date_for(&path, now);
        assert_eq!(snap.origin, DateOrigin::ModifiedTime);
    }

    #[test]
    fn missing_file_uses_now() {
        let now = Local::now();
        let snap = snapshot_date_for(Path::new("/nonexistent/estoque.xlsx"), now);
        assert_eq!(snap.origin, DateOrigin::Now);
        assert_eq!(snap.date, now.date_naive());
    }

    #[test]
    fn dated_name_wins_over_mtime() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ESTOQUE120124.xlsx");
        std::fs::write(&path, b"x").unwrap();
        let snap = snapshot_date_for(&path, Local::now());
        assert_eq!(snap.origin, DateOrigin::FileName);
        assert_eq!(snap.date, date(2024, 1, 12));
    }
}
