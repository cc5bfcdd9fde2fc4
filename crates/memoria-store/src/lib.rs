//! `memoria-store`: SQLite-backed conversation record store.
//!
//! A generic keyed document store: one row per conversation identifier holding
//! the serialized message history. It knows nothing about compaction.

pub mod codec;
pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use error::{Result, StoreError};
pub use store::ConversationStore;
pub use types::{ConversationRecord, RecordStamp};
