use chrono::{DateTime, Utc};
use serde::Serialize;

/// What happened to one conversation during a compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecordOutcome {
    /// A shorter history was written back.
    Compacted { before: usize, after: usize },
    /// Below the threshold, or nothing outside the kept window.
    Unchanged { messages: usize },
    /// A newer write landed while summarizing; the compacted result was dropped.
    Conflict,
}

/// Totals for one batch pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompactionRunReport {
    pub total: usize,
    pub compacted: usize,
    pub skipped: usize,
    pub errors: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl CompactionRunReport {
    pub(crate) fn start(total: usize, started_at: DateTime<Utc>) -> Self {
        Self {
            total,
            compacted: 0,
            skipped: 0,
            errors: 0,
            started_at,
            finished_at: started_at,
            duration_ms: 0,
        }
    }

    pub(crate) fn record<E>(&mut self, result: &Result<RecordOutcome, E>) {
        match result {
            Ok(RecordOutcome::Compacted { .. }) => self.compacted += 1,
            Ok(RecordOutcome::Unchanged { .. } | RecordOutcome::Conflict) => self.skipped += 1,
            Err(_) => self.errors += 1,
        }
    }

    pub(crate) fn finish(&mut self, duration_ms: u64) {
        self.finished_at = Utc::now();
        self.duration_ms = duration_ms;
    }
}
