use anyhow::{bail, Result};
use serde::Serialize;

use crate::index::{strip_whitespace, IndexEntry, StockIndex};
use crate::sanitize::{compact_code, fold};

/// Keys shorter than this never match by being contained in the query.
const MIN_REVERSE_KEY_LEN: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<IndexEntry>,
    /// Results returned (after the cap).
    pub total: usize,
    /// Results matched before the cap was applied.
    pub matched: usize,
    /// True when the query hit a part code exactly.
    pub exact: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SearchResponse {
    /// Response to a query with nothing to match on.
    pub(crate) fn blank(query: &str) -> Self {
        Self {
            query: query.to_string(),
            results: Vec::new(),
            total: 0,
            matched: 0,
            exact: false,
            message: Some("Enter a part code, description or location.".to_string()),
        }
    }
}

/// Trimmed, lowercased, accent-free, whitespace-free form of a query.
pub fn normalize_query(query: &str) -> String {
    strip_whitespace(&fold(query))
}

/// Looks `query` up against part code, description and location.
///
/// An exact compact-code hit returns only the entries for that code.
/// Otherwise every entry is scanned: the code matches when it contains the
/// query or is contained in it; description and location match when they
/// contain the query. Results are ordered newest snapshot first, ties in
/// index order, and capped at `limit`.
pub fn search(index: &StockIndex, query: &str, limit: usize) -> Result<SearchResponse> {
    if limit == 0 {
        bail!("limit must be at least 1");
    }

    let needle = normalize_query(query);
    if needle.is_empty() {
        return Ok(SearchResponse::blank(query));
    }
    let code_needle = compact_code(&needle).to_lowercase();

    let (mut positions, exact) = match index.positions_for_key(&code_needle) {
        Some(hit) if !code_needle.is_empty() => (hit.to_vec(), true),
        _ => (scan(index, &needle, &code_needle), false),
    };

    let entries = index.entries();
    positions.sort_by(|&a, &b| {
        entries[b]
            .record
            .snapshot_date
            .cmp(&entries[a].record.snapshot_date)
            .then(a.cmp(&b))
    });

    let matched = positions.len();
    positions.truncate(limit);
    let results: Vec<IndexEntry> = positions.iter().map(|&i| entries[i].clone()).collect();

    tracing::debug!(query = %query, exact, matched, returned = results.len(), "search");

    let message = if results.is_empty() {
        Some(format!("No stock found for '{}'.", query.trim()))
    } else {
        None
    };

    Ok(SearchResponse {
        query: query.to_string(),
        total: results.len(),
        results,
        matched,
        exact,
        message,
    })
}

fn scan(index: &StockIndex, needle: &str, code_needle: &str) -> Vec<usize> {
    index
        .keys()
        .iter()
        .enumerate()
        .filter(|(_, k)| {
            let code_hit = !code_needle.is_empty()
                && (k.code.contains(code_needle)
                    || (k.code.len() >= MIN_REVERSE_KEY_LEN && code_needle.contains(&k.code)));
            code_hit || k.description.contains(needle) || k.location.contains(needle)
        })
        .map(|(i, _)| i)
        .collect()
}

pub fn print_results(response: &SearchResponse) {
    if response.results.is_empty() {
        println!("No results.");
        return;
    }

    for (i, entry) in response.results.iter().enumerate() {
        let r = &entry.record;
        println!("{}. {}  {}", i + 1, r.part_code, r.description);
        println!("    quantity: {}", r.quantity);
        println!("    location: {}", r.location);
        println!(
            "    snapshot: {} ({})",
            r.snapshot_date.format("%d/%m/%Y"),
            r.source_file
        );
        println!("    last changed: {}", entry.last_changed.format("%d/%m/%Y"));
        println!();
    }

    if response.matched > response.total {
        println!(
            "showing {} of {} matches{}",
            response.total,
            response.matched,
            if response.exact { " (exact code)" } else { "" }
        );
    }
}
