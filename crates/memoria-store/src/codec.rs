//! Serialized form of a message sequence, as stored in `conversations.content`.
//!
//! A JSON array of role-tagged objects:
//! `[{"role":"system","content":"..."},{"role":"user","content":"..."}]`

use memoria_core::Message;

use crate::error::{Result, StoreError};

pub fn encode(messages: &[Message]) -> Result<String> {
    serde_json::to_string(messages).map_err(StoreError::Encode)
}

/// Decode stored content. `conversation_id` only labels the error.
pub fn decode(conversation_id: &str, content: &str) -> Result<Vec<Message>> {
    serde_json::from_str(content).map_err(|source| StoreError::Decode {
        conversation_id: conversation_id.to_string(),
        source,
    })
}
