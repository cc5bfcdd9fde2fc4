use thiserror::Error;

use memoria_store::StoreError;

#[derive(Debug, Error)]
pub enum CompactionError {
    /// Reading or writing the record store failed, or stored content did not decode.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Another batch pass holds the run slot.
    #[error("a compaction pass is already running")]
    AlreadyRunning,
}

pub type Result<T> = std::result::Result<T, CompactionError>;
