//! Periodic import trigger.
//!
//! When auto-import is enabled, a background task calls `Importer::run` once
//! per configured period using `tokio::time::interval`. The first run happens
//! one period after startup; manual imports are unaffected either way.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::config::Config;
use crate::import::{Importer, Trigger};

/// Starts the scheduled import loop, or returns `None` if auto-import is off.
pub fn spawn(importer: Arc<Importer>, config: &Config) -> Option<JoinHandle<()>> {
    if !config.auto_import {
        tracing::info!("Auto-import disabled; imports run only on request");
        return None;
    }
    Some(spawn_every(importer, config.import_frequency.period()))
}

fn spawn_every(importer: Arc<Importer>, period: Duration) -> JoinHandle<()> {
    tracing::info!(interval_secs = period.as_secs(), "Scheduled import started");

    tokio::spawn(async move {
        let mut interval = interval_at(Instant::now() + period, period);
        // A run longer than the period should not cause a burst of catch-up runs.
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            match importer.run(Trigger::Scheduled).await {
                Ok(report) => {
                    tracing::info!(
                        created = report.created,
                        aborted = report.aborted.is_some(),
                        "Scheduled import completed"
                    );
                }
                Err(e) => {
                    tracing::error!(error = %e, "Scheduled import failed");
                }
            }
        }
    })
}
