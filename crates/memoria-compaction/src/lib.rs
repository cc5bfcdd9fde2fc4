//! `memoria-compaction`: keeps conversation histories bounded.
//!
//! A history over the threshold is split into messages that must survive
//! verbatim (System messages and the most recent window) and the rest, which
//! is folded into one summary message through an LLM. [`CompactionService`]
//! drives this for the whole store on a schedule, on demand, or inline after
//! each append.

pub mod error;
pub mod partition;
pub mod pass;
pub mod policy;
pub mod report;
pub mod service;
pub mod summarize;

pub use error::{CompactionError, Result};
pub use partition::{partition, Partition};
pub use pass::{compact, CompactionOutcome};
pub use policy::should_compact;
pub use report::{CompactionRunReport, RecordOutcome};
pub use service::{AppendOutcome, CompactionService};
pub use summarize::{summarize_hierarchically, Summarizer, HISTORY_SUMMARY_TAG};
