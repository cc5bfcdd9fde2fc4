use tracing::debug;

use memoria_core::{CompressionConfig, Message};

use crate::partition::{partition, Partition};
use crate::policy::should_compact;
use crate::summarize::{summarize_hierarchically, Summarizer};

/// Result of running one compaction over a history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionOutcome {
    /// The history to keep: the input itself when nothing changed.
    pub messages: Vec<Message>,
    /// Whether `messages` differs from the input.
    pub compacted: bool,
    /// Length of the input history.
    pub before: usize,
}

impl CompactionOutcome {
    fn unchanged(messages: Vec<Message>) -> Self {
        Self {
            before: messages.len(),
            messages,
            compacted: false,
        }
    }

    pub fn after(&self) -> usize {
        self.messages.len()
    }
}

/// Compact one history.
///
/// Below the threshold, or when every message is important, the input comes
/// back untouched. Otherwise the result is the important messages (System
/// messages first, then the recent window) followed by the summary of the
/// rest.
pub async fn compact(
    messages: Vec<Message>,
    config: &CompressionConfig,
    summarizer: &Summarizer,
) -> CompactionOutcome {
    if !should_compact(messages.len(), config) {
        return CompactionOutcome::unchanged(messages);
    }

    let Partition {
        important,
        compressible,
    } = partition(&messages, config);

    if compressible.is_empty() {
        debug!(
            messages = messages.len(),
            "nothing compressible outside the kept window"
        );
        return CompactionOutcome::unchanged(messages);
    }

    let summary = summarize_hierarchically(&compressible, config, summarizer).await;

    let mut compacted = important;
    compacted.extend(summary);

    CompactionOutcome {
        before: messages.len(),
        messages: compacted,
        compacted: true,
    }
}
