mod common;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use stock_lookup::config::Config;
use stock_lookup::error::InventoryError;
use stock_lookup::service::Inventory;
use tempfile::TempDir;

use common::write_snapshot;

/// Rows `P01..P<count>` all carrying `quantity`.
fn numbered_rows(count: usize, quantity: &str) -> Vec<[String; 4]> {
    (1..=count)
        .map(|n| {
            [
                format!("P{:02}", n),
                format!("Peça {}", n),
                quantity.to_string(),
                format!("R-{:02}", n % 5),
            ]
        })
        .collect()
}

fn write_numbered(dir: &Path, name: &str, count: usize, quantity: &str) {
    let rows = numbered_rows(count, quantity);
    let refs: Vec<[&str; 4]> = rows
        .iter()
        .map(|r| [r[0].as_str(), r[1].as_str(), r[2].as_str(), r[3].as_str()])
        .collect();
    write_snapshot(dir, name, &refs);
}

#[test]
fn newest_snapshot_wins() {
    let tmp = TempDir::new().unwrap();
    write_snapshot(tmp.path(), "ESTOQUE120124.xlsx", &[["X123", "Filtro de ar", "5", "A-01"]]);
    write_snapshot(tmp.path(), "ESTOQUE150124.xlsx", &[["X123", "Filtro de ar", "8", "A-01"]]);

    let inv = Inventory::new(Config::for_data_dir(tmp.path()));
    inv.reload().unwrap();

    let resp = inv.search("X123", None).unwrap();
    assert_eq!(resp.total, 1);
    assert!(resp.exact);
    assert_eq!(resp.results[0].record.quantity, "8");
    assert_eq!(resp.results[0].record.source_file, "ESTOQUE150124.xlsx");
    assert_eq!(resp.results[0].occurrences, 2);
}

#[test]
fn respaced_code_does_not_leave_a_stale_line() {
    let tmp = TempDir::new().unwrap();
    write_snapshot(tmp.path(), "ESTOQUE120124.xlsx", &[["X 123", "Filtro de ar", "5", "a-01"]]);
    write_snapshot(tmp.path(), "ESTOQUE150124.xlsx", &[["X123", "Filtro de ar", "8", "A-01"]]);

    let inv = Inventory::new(Config::for_data_dir(tmp.path()));
    inv.reload().unwrap();

    let resp = inv.search("X123", None).unwrap();
    assert_eq!(resp.total, 1);
    assert_eq!(resp.results[0].record.quantity, "8");
    assert_eq!(resp.results[0].record.source_file, "ESTOQUE150124.xlsx");
}

#[test]
fn empty_query_before_first_load_is_not_an_error() {
    let tmp = TempDir::new().unwrap();
    let inv = Inventory::new(Config::for_data_dir(tmp.path()));

    let resp = inv.search("   ", None).unwrap();
    assert_eq!(resp.total, 0);
    assert!(resp.message.is_some());
    assert!(inv.search("X1", None).is_err());
}

#[test]
fn repeated_header_row_is_dropped() {
    let tmp = TempDir::new().unwrap();
    write_snapshot(
        tmp.path(),
        "ESTOQUE150124.xlsx",
        &[
            ["A1", "Arruela", "10", "G-1"],
            ["Código", "Descrição", "Qtd", "Localização"],
            ["A2", "Anel", "4", "G-2"],
        ],
    );

    let inv = Inventory::new(Config::for_data_dir(tmp.path()));
    let summary = inv.reload().unwrap();
    assert_eq!(summary.records, 2);
    assert_eq!(inv.search("codigo", None).unwrap().total, 0);
}

#[test]
fn empty_directory_reload_keeps_prior_index() {
    let tmp = TempDir::new().unwrap();
    write_snapshot(tmp.path(), "ESTOQUE150124.xlsx", &[["K9", "Chaveta", "2", "F-3"]]);
    let inv = Inventory::new(Config::for_data_dir(tmp.path()));
    let first = inv.reload().unwrap();

    std::fs::remove_file(tmp.path().join("ESTOQUE150124.xlsx")).unwrap();
    let err = inv.reload().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<InventoryError>(),
        Some(InventoryError::NoRecords { files: 0, .. })
    ));

    let resp = inv.search("K9", None).unwrap();
    assert_eq!(resp.results[0].record.quantity, "2");
    assert_eq!(inv.status().generation, Some(first.generation));
}

#[test]
fn results_are_capped_at_final_limit() {
    let tmp = TempDir::new().unwrap();
    write_numbered(tmp.path(), "ESTOQUE150124.xlsx", 37, "1");

    let inv = Inventory::new(Config::for_data_dir(tmp.path()));
    inv.reload().unwrap();

    let resp = inv.search("P", None).unwrap();
    assert_eq!(resp.total, 20);
    assert_eq!(resp.matched, 37);
    assert!(!resp.exact);

    let resp = inv.search("P", Some(5)).unwrap();
    assert_eq!(resp.total, 5);
}

#[test]
fn readers_never_observe_a_mixed_generation() {
    let tmp = TempDir::new().unwrap();
    write_numbered(tmp.path(), "ESTOQUE150124.xlsx", 30, "0");

    let inv = Arc::new(Inventory::new(Config::for_data_dir(tmp.path())));
    inv.reload().unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let inv = inv.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                let mut checked = 0usize;
                while !stop.load(Ordering::Relaxed) || checked == 0 {
                    let resp = inv.search("P", None).unwrap();
                    assert_eq!(resp.total, 20);
                    let first = &resp.results[0].record.quantity;
                    assert!(
                        resp.results.iter().all(|e| &e.record.quantity == first),
                        "mixed generations in one response"
                    );
                    checked += 1;
                }
                checked
            })
        })
        .collect();

    for marker in 1..=5 {
        write_numbered(tmp.path(), "ESTOQUE150124.xlsx", 30, &marker.to_string());
        inv.reload().unwrap();
    }
    stop.store(true, Ordering::Relaxed);

    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }
    assert_eq!(inv.search("P01", None).unwrap().results[0].record.quantity, "5");
}

#[test]
fn startup_prefers_matching_cache() {
    let tmp = TempDir::new().unwrap();
    let data_dir = tmp.path().join("planilhas");
    write_snapshot(&data_dir, "ESTOQUE150124.xlsx", &[["Z7", "Mola", "11", "D-4"]]);

    let mut config = Config::for_data_dir(&data_dir);
    config.cache.path = Some(tmp.path().join("cache").join("stock.json"));
    Inventory::new(config.clone()).reload().unwrap();

    let inv = Inventory::new(config);
    inv.startup().unwrap();
    let status = inv.status();
    assert_eq!(
        serde_json::to_value(status.source).unwrap(),
        serde_json::json!("cache")
    );
    assert_eq!(inv.search("z7", None).unwrap().results[0].record.quantity, "11");
}
