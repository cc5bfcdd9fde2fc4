//! `memoria-agent`: text-generation backends used for summarization.
//!
//! Everything behind [`provider::LlmProvider`]: an OpenAI-compatible client,
//! an Ollama client, and a failover router over several of them.

pub mod ollama;
pub mod openai;
pub mod provider;
pub mod router;

pub use provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};
pub use router::{ProviderRouter, ProviderSlot};
