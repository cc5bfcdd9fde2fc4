use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, instrument};
use uuid::Uuid;

use memoria_core::Message;

use crate::codec;
use crate::db::init_db;
use crate::error::Result;
use crate::types::{ConversationRecord, RecordStamp};

/// Thread-safe store for persisted conversation histories.
///
/// Wraps a single SQLite connection in a `Mutex`. Each public call holds the
/// lock for exactly one statement, so a single read and a single replace are
/// each atomic; anything spanning both is the caller's concern.
pub struct ConversationStore {
    db: Mutex<Connection>,
}

impl ConversationStore {
    /// Wrap an open connection, creating the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Messages stored for `conversation_id`, or an empty history if none exist.
    #[instrument(skip(self))]
    pub fn get(&self, conversation_id: &str) -> Result<Vec<Message>> {
        match self.get_record(conversation_id)? {
            Some(record) => record.messages(),
            None => Ok(Vec::new()),
        }
    }

    /// The raw record for `conversation_id`, if one exists.
    #[instrument(skip(self))]
    pub fn get_record(&self, conversation_id: &str) -> Result<Option<ConversationRecord>> {
        let db = self.conn();
        let record = db
            .query_row(
                "SELECT id, conversation_id, content, version, created_at, updated_at
                 FROM conversations WHERE conversation_id = ?1",
                rusqlite::params![conversation_id],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Overwrite the history for `conversation_id`, creating the record on
    /// first write (upsert). Returns the stamp of the write.
    #[instrument(skip(self, messages), fields(count = messages.len()))]
    pub fn replace(&self, conversation_id: &str, messages: &[Message]) -> Result<RecordStamp> {
        let content = codec::encode(messages)?;
        let id = Uuid::now_v7().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        let db = self.conn();
        let stamp = db.query_row(
            "INSERT INTO conversations
             (id, conversation_id, content, version, created_at, updated_at)
             VALUES (?1, ?2, ?3, 1, ?4, ?4)
             ON CONFLICT(conversation_id) DO UPDATE SET
                content    = excluded.content,
                version    = conversations.version + 1,
                updated_at = excluded.updated_at
             RETURNING id, version",
            rusqlite::params![id, conversation_id, content, now],
            |row| {
                Ok(RecordStamp {
                    id: row.get(0)?,
                    version: row.get(1)?,
                })
            },
        )?;
        debug!(version = stamp.version, "conversation replaced");
        Ok(stamp)
    }

    /// Overwrite the history only if the stored record is still the write
    /// described by `expected`: same record and same version.
    ///
    /// Returns `false` when another writer got there first, or the record was
    /// deleted (and possibly recreated); nothing is written in that case.
    #[instrument(skip(self, messages, expected), fields(count = messages.len(), expected_version = expected.version))]
    pub fn replace_if_version(
        &self,
        conversation_id: &str,
        messages: &[Message],
        expected: &RecordStamp,
    ) -> Result<bool> {
        let content = codec::encode(messages)?;
        let now = chrono::Utc::now().to_rfc3339();

        let db = self.conn();
        let rows_changed = db.execute(
            "UPDATE conversations
             SET content = ?1, version = version + 1, updated_at = ?2
             WHERE conversation_id = ?3 AND id = ?4 AND version = ?5",
            rusqlite::params![content, now, conversation_id, expected.id, expected.version],
        )?;
        if rows_changed == 0 {
            debug!("conditional replace lost the race");
        }
        Ok(rows_changed == 1)
    }

    /// Remove the record for `conversation_id`. Returns whether one existed.
    #[instrument(skip(self))]
    pub fn delete(&self, conversation_id: &str) -> Result<bool> {
        let db = self.conn();
        let rows_changed = db.execute(
            "DELETE FROM conversations WHERE conversation_id = ?1",
            rusqlite::params![conversation_id],
        )?;
        Ok(rows_changed > 0)
    }

    /// Every stored record, least recently updated first.
    pub fn list_records(&self) -> Result<Vec<ConversationRecord>> {
        let db = self.conn();
        let mut stmt = db.prepare(
            "SELECT id, conversation_id, content, version, created_at, updated_at
             FROM conversations
             ORDER BY updated_at, conversation_id",
        )?;
        let rows = stmt.query_map([], row_to_record)?;
        let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Number of stored conversations.
    pub fn count(&self) -> Result<u64> {
        let db = self.conn();
        let n: i64 = db.query_row("SELECT COUNT(*) FROM conversations", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    // A panic while holding the lock cannot leave SQLite half-written, so a
    // poisoned mutex is still safe to use.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Map a SQLite row to a `ConversationRecord`.
fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationRecord> {
    Ok(ConversationRecord {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        content: row.get(2)?,
        version: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}
