use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use dashmap::DashMap;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use memoria_core::{CompressionConfig, Message};
use memoria_store::{ConversationRecord, ConversationStore, RecordStamp};

use crate::error::{CompactionError, Result};
use crate::pass::compact;
use crate::policy::should_compact;
use crate::report::{CompactionRunReport, RecordOutcome};
use crate::summarize::Summarizer;

/// Result of appending messages to a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppendOutcome {
    /// History length after the append and any compaction.
    pub messages: usize,
    /// Set when the append pushed the history over the threshold.
    pub compaction: Option<RecordOutcome>,
}

/// Owns the compaction machinery for one store.
///
/// Appends to the same conversation are serialized through a per-conversation
/// lock. Compaction write-backs are conditional on the record stamp read
/// before summarizing, so a slow summary never overwrites newer messages or
/// a conversation that was cleared and started again.
pub struct CompactionService {
    store: Arc<ConversationStore>,
    summarizer: Summarizer,
    config: CompressionConfig,
    locks: DashMap<String, Arc<Mutex<()>>>,
    running: AtomicBool,
}

impl CompactionService {
    pub fn new(
        store: Arc<ConversationStore>,
        summarizer: Summarizer,
        config: CompressionConfig,
    ) -> Self {
        Self {
            store,
            summarizer,
            config,
            locks: DashMap::new(),
            running: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    /// Whether a batch pass is in progress right now.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Compact every stored conversation that is over the threshold.
    ///
    /// Returns `Ok(None)` when compaction is disabled. Per-conversation
    /// failures are logged and counted in the report; only a failure to
    /// enumerate the store or a pass already in flight is an `Err`.
    #[instrument(skip(self))]
    pub async fn run_pass(&self) -> Result<Option<CompactionRunReport>> {
        if !self.config.enabled {
            debug!("compaction disabled, skipping pass");
            return Ok(None);
        }

        let _guard = self.try_begin_pass().ok_or(CompactionError::AlreadyRunning)?;

        let started_at = Utc::now();
        let clock = Instant::now();

        let records = self.store.list_records()?;
        info!(conversations = records.len(), "compaction pass started");

        let mut report = CompactionRunReport::start(records.len(), started_at);
        let mut results = stream::iter(records)
            .map(|record| async move {
                let result = self.compact_record(&record).await;
                (record, result)
            })
            .buffer_unordered(self.config.max_concurrency.max(1));

        while let Some((record, result)) = results.next().await {
            match &result {
                Ok(outcome) => self.log_outcome(&record.conversation_id, outcome),
                Err(e) => error!(
                    conversation = %record.conversation_id,
                    error = %e,
                    "conversation compaction failed"
                ),
            }
            report.record(&result);
        }

        report.finish(clock.elapsed().as_millis() as u64);
        info!(
            total = report.total,
            compacted = report.compacted,
            skipped = report.skipped,
            errors = report.errors,
            duration_ms = report.duration_ms,
            "compaction pass finished"
        );
        Ok(Some(report))
    }

    /// Compact a single conversation now, regardless of the schedule.
    ///
    /// Storage and decode errors are returned to the caller.
    #[instrument(skip(self))]
    pub async fn compact_conversation(&self, conversation_id: &str) -> Result<RecordOutcome> {
        let Some(record) = self.store.get_record(conversation_id)? else {
            return Ok(RecordOutcome::Unchanged { messages: 0 });
        };
        let outcome = self.compact_record(&record).await?;
        self.log_outcome(conversation_id, &outcome);
        Ok(outcome)
    }

    /// Append messages to a conversation, then compact it if it grew past
    /// the threshold.
    ///
    /// The append is persisted before any summarization starts. A failed
    /// compaction write-back is logged and leaves the appended history in
    /// place.
    #[instrument(skip(self, new_messages), fields(new = new_messages.len()))]
    pub async fn append(
        &self,
        conversation_id: &str,
        new_messages: Vec<Message>,
    ) -> Result<AppendOutcome> {
        let lock = self.lock_for(conversation_id);
        let persisted = {
            let _held = lock.lock().await;
            self.store.get(conversation_id).and_then(|mut history| {
                history.extend(new_messages);
                let stamp = self.store.replace(conversation_id, &history)?;
                Ok((history, stamp))
            })
        };
        self.release_lock(conversation_id, lock);
        let (history, stamp) = persisted?;

        if !should_compact(history.len(), &self.config) {
            return Ok(AppendOutcome {
                messages: history.len(),
                compaction: None,
            });
        }

        let stored = history.len();
        let outcome = compact(history, &self.config, &self.summarizer).await;
        if !outcome.compacted {
            return Ok(AppendOutcome {
                messages: stored,
                compaction: Some(RecordOutcome::Unchanged { messages: stored }),
            });
        }

        let result = match self
            .write_back(conversation_id, &outcome.messages, &stamp)
            .await
        {
            Ok(true) => AppendOutcome {
                messages: outcome.after(),
                compaction: Some(RecordOutcome::Compacted {
                    before: outcome.before,
                    after: outcome.after(),
                }),
            },
            Ok(false) => AppendOutcome {
                messages: stored,
                compaction: Some(RecordOutcome::Conflict),
            },
            Err(e) => {
                warn!(
                    conversation = %conversation_id,
                    error = %e,
                    "inline compaction write failed, keeping uncompacted history"
                );
                AppendOutcome {
                    messages: stored,
                    compaction: None,
                }
            }
        };
        if let Some(outcome) = &result.compaction {
            self.log_outcome(conversation_id, outcome);
        }
        Ok(result)
    }

    /// Delete a conversation. Returns whether it existed.
    #[instrument(skip(self))]
    pub async fn clear(&self, conversation_id: &str) -> Result<bool> {
        let lock = self.lock_for(conversation_id);
        let existed = {
            let _held = lock.lock().await;
            self.store.delete(conversation_id)
        };
        self.release_lock(conversation_id, lock);
        Ok(existed?)
    }

    async fn compact_record(&self, record: &ConversationRecord) -> Result<RecordOutcome> {
        let messages = record.messages()?;
        if !should_compact(messages.len(), &self.config) {
            return Ok(RecordOutcome::Unchanged {
                messages: messages.len(),
            });
        }

        let outcome = compact(messages, &self.config, &self.summarizer).await;
        if !outcome.compacted {
            return Ok(RecordOutcome::Unchanged {
                messages: outcome.before,
            });
        }

        let applied = self
            .write_back(&record.conversation_id, &outcome.messages, &record.stamp())
            .await?;
        if applied {
            Ok(RecordOutcome::Compacted {
                before: outcome.before,
                after: outcome.after(),
            })
        } else {
            Ok(RecordOutcome::Conflict)
        }
    }

    async fn write_back(
        &self,
        conversation_id: &str,
        messages: &[Message],
        expected: &RecordStamp,
    ) -> Result<bool> {
        let lock = self.lock_for(conversation_id);
        let applied = {
            let _held = lock.lock().await;
            self.store
                .replace_if_version(conversation_id, messages, expected)
        };
        self.release_lock(conversation_id, lock);
        Ok(applied?)
    }

    fn lock_for(&self, conversation_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(conversation_id.to_string())
            .or_default()
            .clone()
    }

    /// Drop our handle and the map entry, unless another task still holds one.
    fn release_lock(&self, conversation_id: &str, lock: Arc<Mutex<()>>) {
        drop(lock);
        self.locks
            .remove_if(conversation_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    fn try_begin_pass(&self) -> Option<PassGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| PassGuard(&self.running))
    }

    fn log_outcome(&self, conversation_id: &str, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Compacted { before, after } => info!(
                conversation = %conversation_id,
                before,
                after,
                "conversation compacted"
            ),
            RecordOutcome::Conflict => warn!(
                conversation = %conversation_id,
                "conversation changed during compaction, keeping newer history"
            ),
            RecordOutcome::Unchanged { messages } => {
                if self.config.verbose_logging {
                    info!(
                        conversation = %conversation_id,
                        messages,
                        threshold = self.config.threshold,
                        "conversation left as is"
                    );
                }
            }
        }
    }
}

/// Releases the single batch-pass slot on drop.
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
