//! Chunk summarization and the hierarchical summary tree.
//!
//! A [`Summarizer`] turns one chunk of messages into a short text and never
//! fails: provider errors, timeouts and empty completions all fall back to a
//! degraded summary that carries the raw transcript, so no information is
//! dropped on the floor. [`summarize_hierarchically`] folds an arbitrarily
//! long sequence down to a single tagged summary message by summarizing
//! chunks level by level.
//!
//! Every clone of a [`Summarizer`] shares one permit pool sized by
//! `max_concurrency`, so the total number of model calls in flight stays
//! bounded no matter how many conversations are compacted at once.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use memoria_agent::{ChatRequest, LlmProvider};
use memoria_core::{CompressionConfig, Message};

/// Prefix of the final summary message produced by a compaction.
pub const HISTORY_SUMMARY_TAG: &str = "[History summary]";

/// Prefix of a summary that fell back to the raw transcript.
pub const DEGRADED_SUMMARY_TAG: &str = "[Degraded summary]";

const SUMMARY_MAX_TOKENS: u32 = 1024;

const SUMMARY_PROMPT: &str = "\
You are summarizing part of a conversation between a patient and a medical assistant.
Write a concise, chronological summary of the dialogue below. Retain:
- symptoms the user described
- diagnoses or assessments
- medications with name, dose and usage
- test and examination results
- treatment instructions and follow-up timing
- appointments with department, doctor, time and status
Keep any system notices. Leave out greetings and small talk.

Dialogue:
";

/// Render messages as a plain transcript, one `Label: text` line each.
pub fn render_transcript(messages: &[Message]) -> String {
    let mut transcript = String::new();
    for message in messages {
        transcript.push_str(message.kind().label());
        transcript.push_str(": ");
        transcript.push_str(message.text());
        transcript.push('\n');
    }
    transcript
}

/// The full instruction sent to the model for one chunk.
pub fn build_prompt(transcript: &str) -> String {
    format!("{SUMMARY_PROMPT}{transcript}")
}

/// Summary used when the model could not produce one.
pub fn degraded_summary(transcript: &str) -> String {
    format!("{DEGRADED_SUMMARY_TAG} {transcript}")
}

/// Summarizes chunks of messages through an [`LlmProvider`].
#[derive(Clone)]
pub struct Summarizer {
    provider: Arc<dyn LlmProvider>,
    model: String,
    timeout: Duration,
    permits: Arc<Semaphore>,
}

impl Summarizer {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &CompressionConfig) -> Self {
        Self {
            provider,
            model: config.summary_model.clone(),
            timeout: Duration::from_secs(config.summary_timeout_secs),
            permits: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Summarize one chunk. Infallible by construction; see the module docs.
    pub async fn summarize(&self, chunk: &[Message]) -> String {
        if chunk.is_empty() {
            return String::new();
        }

        let transcript = render_transcript(chunk);
        let req = ChatRequest::single(&self.model, build_prompt(&transcript), SUMMARY_MAX_TOKENS);

        // The pool is never closed; the timeout starts once a slot is held.
        let _permit = self.permits.acquire().await.ok();
        match tokio::time::timeout(self.timeout, self.provider.send(&req)).await {
            Ok(Ok(resp)) => {
                let text = resp.content.trim();
                if text.is_empty() {
                    warn!(
                        provider = %self.provider.name(),
                        messages = chunk.len(),
                        "summarization returned empty text, degrading chunk"
                    );
                    return degraded_summary(&transcript);
                }
                debug!(
                    messages = chunk.len(),
                    tokens_in = resp.tokens_in,
                    tokens_out = resp.tokens_out,
                    "chunk summarized"
                );
                text.to_string()
            }
            Ok(Err(e)) => {
                warn!(
                    provider = %self.provider.name(),
                    error = %e,
                    messages = chunk.len(),
                    "summarization failed, degrading chunk"
                );
                degraded_summary(&transcript)
            }
            Err(_) => {
                warn!(
                    provider = %self.provider.name(),
                    timeout_secs = self.timeout.as_secs(),
                    messages = chunk.len(),
                    "summarization timed out, degrading chunk"
                );
                degraded_summary(&transcript)
            }
        }
    }
}

/// Fold `messages` into a single tagged summary message.
///
/// A level of at most `2 * chunk_size` messages is summarized in one call,
/// System messages included. A longer level is cut into consecutive chunks
/// of `chunk_size`, each summarized on its own (up to `max_concurrency` at a
/// time, order preserved), and the summaries become the next level as
/// assistant messages. A leading System message is kept out of the chunks
/// and carried to the front of the next level untouched.
///
/// Always returns exactly one assistant message starting with
/// [`HISTORY_SUMMARY_TAG`], even for empty input.
pub async fn summarize_hierarchically(
    messages: &[Message],
    config: &CompressionConfig,
    summarizer: &Summarizer,
) -> Vec<Message> {
    let chunk_size = config.chunk_size.max(2);
    let concurrency = config.max_concurrency.max(1);

    let mut level = messages.to_vec();
    let mut depth = 0usize;
    while level.len() > 2 * chunk_size {
        depth += 1;
        debug!(depth, messages = level.len(), chunk_size, "summarizing level");

        let carried = match level.first() {
            Some(first) if first.is_system() => Some(level.remove(0)),
            _ => None,
        };
        let chunks: Vec<Vec<Message>> = level.chunks(chunk_size).map(<[Message]>::to_vec).collect();

        let summaries: Vec<String> = stream::iter(chunks)
            .map(|chunk| async move { summarizer.summarize(&chunk).await })
            .buffered(concurrency)
            .collect()
            .await;

        level = carried
            .into_iter()
            .chain(summaries.into_iter().map(Message::assistant))
            .collect();
    }

    let digest = summarizer.summarize(&level).await;
    vec![Message::assistant(format!("{HISTORY_SUMMARY_TAG}\n{digest}"))]
}
