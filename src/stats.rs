//! Human-readable status and report printing for the CLI.
//!
//! Gives a quick picture of what is loaded: item and record counts, when
//! the data was built, and how each spreadsheet fared. Also prints the
//! analytics reports behind `stk summary`, `stk deltas`, `stk history` and
//! `stk locations`.

use crate::analytics::{LocationChange, PartHistory, SnapshotDelta, Summary};
use crate::ingest::FileStatus;
use crate::service::{InventoryStatus, ReloadSummary};

pub fn print_status(status: &InventoryStatus) {
    println!("Stock Lookup: Inventory Status");
    println!("==============================");
    println!();

    if !status.loaded {
        println!("  Loaded:      no");
        if let Some(ref err) = status.last_error {
            println!("  Last error:  {}", err);
        }
        println!();
        return;
    }

    println!("  Loaded:      yes (generation {})", status.generation.unwrap_or(0));
    if let Some(source) = status.source {
        println!("  Source:      {:?}", source);
    }
    println!("  Items:       {}", format_count(status.item_count as u64));
    println!("  Records:     {}", format_count(status.record_count as u64));
    println!("  Codes:       {}", format_count(status.code_count as u64));
    println!("  Files:       {}", status.file_count);
    if let Some(ts) = status.data_built_at {
        println!("  Data built:  {}", format_ts_relative(ts.timestamp()));
    }
    if let Some(ts) = status.index_built_at {
        println!("  Index built: {}", format_ts_relative(ts.timestamp()));
    }
    if let Some(ref err) = status.last_error {
        println!("  Last error:  {}", err);
    }

    if !status.files.is_empty() {
        println!();
        println!("  By file:");
        println!(
            "  {:<28} {:<10} {:<16} {:>8}   {}",
            "FILE", "SNAPSHOT", "STRATEGY", "RECORDS", "NOTES"
        );
        println!("  {}", "-".repeat(76));
        for f in &status.files {
            let (strategy, records, notes) = match &f.status {
                FileStatus::Loaded {
                    strategy,
                    records,
                    skipped_rows,
                    dropped_artifacts,
                } => (
                    strategy.as_str(),
                    records.to_string(),
                    format!("{} blank, {} header rows", skipped_rows, dropped_artifacts),
                ),
                FileStatus::Skipped { reason } => ("-", "-".to_string(), reason.clone()),
            };
            println!(
                "  {:<28} {:<10} {:<16} {:>8}   {}",
                f.file,
                f.snapshot.date.format("%Y-%m-%d"),
                strategy,
                records,
                notes
            );
        }
    }
    println!();
}

pub fn print_reload(summary: &ReloadSummary) {
    println!("reload");
    println!("  files loaded: {}", summary.files_loaded);
    println!("  files skipped: {}", summary.files_skipped);
    println!("  records: {}", summary.records);
    println!("  items: {}", summary.items);
    println!("  elapsed: {} ms", summary.elapsed_ms);
    println!("ok");
}

pub fn print_summary(s: &Summary) {
    println!("  Items:            {}", format_count(s.items as u64));
    println!("  Records:          {}", format_count(s.records as u64));
    println!("  Total quantity:   {}", format_quantity(s.total_quantity));
    println!("  Distinct codes:   {}", format_count(s.unique_codes as u64));
    println!("  Locations:        {}", format_count(s.unique_locations as u64));
    println!("  Snapshots:        {}", s.snapshots);
    if let (Some(first), Some(last)) = (s.first_snapshot, s.last_snapshot) {
        println!(
            "  Date range:       {} .. {}",
            first.format("%Y-%m-%d"),
            last.format("%Y-%m-%d")
        );
    }
}

pub fn print_deltas(deltas: &[SnapshotDelta]) {
    if deltas.is_empty() {
        println!("No results.");
        return;
    }
    for d in deltas {
        println!(
            "{} -> {}: {} new, {} removed, {} changed, {} unchanged",
            d.from.format("%Y-%m-%d"),
            d.to.format("%Y-%m-%d"),
            d.new_codes.len(),
            d.removed_codes.len(),
            d.changed.len(),
            d.unchanged
        );
        for c in &d.changed {
            println!(
                "    {:<20} {:>10} -> {:<10} ({:+})",
                c.part_code,
                format_quantity(c.before),
                format_quantity(c.after),
                c.delta
            );
        }
    }
}

pub fn print_history(history: &PartHistory) {
    println!("{}", history.part_code);
    for r in &history.entries {
        println!(
            "  {}  {:>10}  {:<12} {}",
            r.snapshot_date.format("%Y-%m-%d"),
            r.quantity,
            r.location,
            r.source_file
        );
    }
    match &history.stats {
        Some(st) => println!(
            "  min {}  max {}  mean {:.2}  ({} numeric)",
            format_quantity(st.min),
            format_quantity(st.max),
            st.mean,
            st.count
        ),
        None => println!("  no numeric quantities"),
    }
}

pub fn print_locations(changes: &[LocationChange]) {
    if changes.is_empty() {
        println!("No results.");
        return;
    }
    println!(
        "{:<20} {:<16} {:<16} {:>5}   SEEN",
        "CODE", "FIRST", "LAST", "LOCS"
    );
    for c in changes {
        println!(
            "{:<20} {:<16} {:<16} {:>5}   {} .. {}",
            c.part_code,
            c.first_location,
            c.last_location,
            c.distinct_locations,
            c.first_seen.format("%Y-%m-%d"),
            c.last_seen.format("%Y-%m-%d")
        );
    }
}

fn format_quantity(q: f64) -> String {
    if q.fract() == 0.0 {
        format!("{}", q as i64)
    } else {
        format!("{:.2}", q)
    }
}

/// `1234567` as `1,234,567`.
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [(&str, u64); 3] = [("GB", 1 << 30), ("MB", 1 << 20), ("KB", 1 << 10)];
    for (unit, size) in UNITS {
        if bytes >= size {
            return format!("{:.1} {}", bytes as f64 / size as f64, unit);
        }
    }
    format!("{} B", bytes)
}

/// Unix timestamp as "3 hours ago", or a date once it is a month old or in
/// the future.
pub fn format_ts_relative(ts: i64) -> String {
    let age = chrono::Utc::now().timestamp() - ts;
    let (count, unit) = match age {
        a if a < 0 || a >= 86_400 * 30 => return format_ts_iso(ts),
        a if a < 60 => return "just now".to_string(),
        a if a < 3_600 => (a / 60, "min"),
        a if a < 86_400 => (a / 3_600, "hour"),
        a => (a / 86_400, "day"),
    };
    format!("{} {}{} ago", count, unit, if count == 1 { "" } else { "s" })
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
