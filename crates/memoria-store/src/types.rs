use serde::{Deserialize, Serialize};

use memoria_core::Message;

use crate::codec;
use crate::error::Result;

/// A persisted conversation history.
///
/// `content` stays in its serialized form so enumeration never fails on a
/// single bad row; callers decode with [`ConversationRecord::messages`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// UUIDv7 primary key (time-sortable).
    pub id: String,
    /// The unique key the history is stored under.
    pub conversation_id: String,
    /// Serialized message sequence.
    pub content: String,
    /// Bumped on every write; used for conditional replaces.
    pub version: i64,
    /// RFC3339 creation timestamp.
    pub created_at: String,
    /// RFC3339 timestamp of the last write.
    pub updated_at: String,
}

/// Identity of one stored write: the record it landed in and its version.
///
/// Deleting a conversation and writing it again creates a new record whose
/// version restarts at 1, so the version alone does not identify a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordStamp {
    pub id: String,
    pub version: i64,
}

impl ConversationRecord {
    pub fn stamp(&self) -> RecordStamp {
        RecordStamp {
            id: self.id.clone(),
            version: self.version,
        }
    }

    /// Decode the stored message sequence.
    pub fn messages(&self) -> Result<Vec<Message>> {
        codec::decode(&self.conversation_id, &self.content)
    }
}
