//! # Stock Lookup CLI (`stk`)
//!
//! ## Usage
//!
//! ```bash
//! stk --config ./config/stock.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `stk serve` | Start the HTTP API with the scheduled reload |
//! | `stk reload` | Rebuild from the spreadsheets and rewrite the cache |
//! | `stk search "<query>"` | Look up a part code, description or location |
//! | `stk status` | Show what is loaded and how each file fared |
//! | `stk files` | List the spreadsheets in the data directory |
//! | `stk history <code>` | Per-snapshot history of one part |
//! | `stk deltas` | Changes between adjacent snapshots |
//! | `stk locations` | Parts whose location changed |
//! | `stk summary` | Inventory totals |
//!
//! Every command except `serve` and `reload` reads the cache when one is
//! configured and still matches the spreadsheets, and rebuilds otherwise.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use stock_lookup::config;
use stock_lookup::files;
use stock_lookup::progress::ProgressMode;
use stock_lookup::search;
use stock_lookup::server;
use stock_lookup::service::Inventory;
use stock_lookup::stats;

/// Stock lookup over warehouse spreadsheet snapshots.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/stock.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "stk",
    about = "Stock lookup over warehouse spreadsheet snapshots",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/stock.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API.
    ///
    /// Loads the inventory (cache first), then serves on `[server].bind`
    /// and reloads every `[reload].interval_secs`.
    Serve,

    /// Rebuild the inventory from the spreadsheets.
    Reload {
        /// Progress on stderr. Defaults to `human` on a terminal, `off` otherwise.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Search by part code, description or location.
    Search {
        query: String,

        /// Maximum results (capped by `[retrieval].final_limit`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show load status and per-file reports.
    Status,

    /// List spreadsheets in the data directory.
    Files,

    /// Per-snapshot history of one part code.
    History { code: String },

    /// Quantity changes between adjacent snapshots.
    Deltas,

    /// Parts whose location changed across snapshots.
    Locations,

    /// Inventory totals.
    Summary,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Reload { progress } => {
            let inventory = Inventory::new(cfg);
            let reporter = progress.unwrap_or_else(ProgressMode::auto).reporter();
            let summary = inventory.reload_with_progress(reporter.as_ref())?;
            stats::print_reload(&summary);
        }
        Commands::Files => {
            files::print_files(&files::list_spreadsheets(&cfg.data)?);
        }
        Commands::Search { query, limit } => {
            let inventory = open(cfg)?;
            let response = inventory.search(&query, limit)?;
            search::print_results(&response);
        }
        Commands::Status => {
            let inventory = Inventory::new(cfg);
            if let Err(e) = inventory.startup() {
                tracing::warn!(error = %format!("{:#}", e), "inventory not loaded");
            }
            stats::print_status(&inventory.status());
        }
        Commands::History { code } => match open(cfg)?.history(&code)? {
            Some(history) => stats::print_history(&history),
            None => println!("No results."),
        },
        Commands::Deltas => {
            stats::print_deltas(&open(cfg)?.deltas()?);
        }
        Commands::Locations => {
            stats::print_locations(&open(cfg)?.location_changes()?);
        }
        Commands::Summary => {
            stats::print_summary(&open(cfg)?.summary()?);
        }
    }

    Ok(())
}

/// Inventory loaded from the cache, or rebuilt when the cache is unusable.
fn open(cfg: config::Config) -> anyhow::Result<Inventory> {
    let inventory = Inventory::new(cfg);
    inventory.startup()?;
    Ok(inventory)
}
