use thiserror::Error;

/// Errors that can occur against the conversation record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Stored content could not be decoded into messages.
    #[error("conversation {conversation_id} holds undecodable content: {source}")]
    Decode {
        conversation_id: String,
        #[source]
        source: serde_json::Error,
    },

    /// A message sequence could not be serialized.
    #[error("failed to encode messages: {0}")]
    Encode(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
