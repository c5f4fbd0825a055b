//! Periodic reload task.
//!
//! Runs on the tokio runtime, off the request path: every tick hands the
//! rebuild to the blocking pool and publishes the outcome on a `watch`
//! channel. The first tick fires one full period after spawning, since
//! startup has already loaded the inventory.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::service::{Inventory, ReloadSummary};

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReloadEvent {
    /// Completed scheduled runs, successful or not.
    pub runs: u64,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcome: Option<ReloadOutcome>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ReloadOutcome {
    Reloaded(ReloadSummary),
    Failed { error: String },
}

pub fn spawn_periodic_reload(
    inventory: Arc<Inventory>,
    period: Duration,
) -> (JoinHandle<()>, watch::Receiver<ReloadEvent>) {
    let (tx, rx) = watch::channel(ReloadEvent::default());

    let handle = tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut runs = 0u64;

        loop {
            ticker.tick().await;
            tracing::info!(period_secs = period.as_secs(), "scheduled reload starting");

            let inv = inventory.clone();
            let outcome = match tokio::task::spawn_blocking(move || inv.reload()).await {
                Ok(Ok(summary)) => ReloadOutcome::Reloaded(summary),
                Ok(Err(e)) => ReloadOutcome::Failed {
                    error: format!("{:#}", e),
                },
                Err(join_err) => ReloadOutcome::Failed {
                    error: format!("reload task failed: {}", join_err),
                },
            };

            runs += 1;
            let event = ReloadEvent {
                runs,
                finished_at: Some(Utc::now()),
                outcome: Some(outcome),
            };
            if tx.send(event).is_err() {
                tracing::debug!("no reload event listeners left");
            }
        }
    });

    (handle, rx)
}
