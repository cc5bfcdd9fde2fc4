use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use memoria_compaction::{CompactionError, CompactionService};
use memoria_core::Schedule;

use crate::error::Result;
use crate::schedule::{next_fire, validate};

/// Fires the batch compaction pass on a fixed schedule.
pub struct SchedulerEngine {
    service: Arc<CompactionService>,
    schedule: Schedule,
}

impl SchedulerEngine {
    pub fn new(service: Arc<CompactionService>, schedule: Schedule) -> Result<Self> {
        validate(&schedule)?;
        Ok(Self { service, schedule })
    }

    /// Main loop. Sleeps until the next fire time, then starts a pass in the
    /// background, until `shutdown` broadcasts `true`.
    ///
    /// Each pass runs on its own task so the clock keeps ticking; a tick that
    /// finds the previous pass still running is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(schedule = %self.schedule, "compaction scheduler started");

        let mut last: Option<DateTime<Utc>> = None;
        loop {
            let now = Utc::now();
            let Some(next) = next_fire(&self.schedule, now, last) else {
                error!(schedule = %self.schedule, "schedule produced no next run, stopping scheduler");
                break;
            };
            let wait = (next - now).to_std().unwrap_or_default();
            debug!(next_run = %next.to_rfc3339(), "next compaction pass scheduled");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    last = Some(next);
                    self.fire();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("compaction scheduler shutting down");
                        break;
                    }
                }
            }
        }
    }

    fn fire(&self) {
        let service = Arc::clone(&self.service);
        tokio::spawn(async move {
            match service.run_pass().await {
                Ok(Some(_)) => {}
                Ok(None) => debug!("scheduled pass skipped, compaction disabled"),
                Err(CompactionError::AlreadyRunning) => {
                    warn!("previous compaction pass still running, dropping tick")
                }
                Err(e) => error!(error = %e, "scheduled compaction pass failed"),
            }
        });
    }
}
