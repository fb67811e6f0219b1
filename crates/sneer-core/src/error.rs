//! Error types for the Sneer tuple space

use thiserror::Error;

/// Main error type for tuple space and runtime operations
#[derive(Error, Debug)]
pub enum SneerError {
    /// Nickname already bound to a different party
    #[error("Nickname already in use: {0}")]
    NameConflict(String),

    /// Nickname rejected before reaching the store (e.g. empty)
    #[error("Invalid nickname: {0}")]
    InvalidNickname(String),

    /// Durable append, load or restart failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Database creation/opening error
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    /// Transaction error
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    /// Table error
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    /// Storage operation error
    #[error("Storage operation error: {0}")]
    StorageOp(#[from] redb::StorageError),

    /// Commit error
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    /// Error during serialization/deserialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Key decoding, signing or signature verification failed
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Invalid operation for current state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SneerError {
    /// Whether this failure is meant to be shown to the user as-is.
    ///
    /// Friendly errors leave no state behind; everything else is an
    /// internal failure the caller should report as such.
    pub fn is_friendly(&self) -> bool {
        matches!(
            self,
            SneerError::NameConflict(_) | SneerError::InvalidNickname(_)
        )
    }

    /// Whether this is a storage-layer failure.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            SneerError::Storage(_)
                | SneerError::Database(_)
                | SneerError::Transaction(_)
                | SneerError::Table(_)
                | SneerError::StorageOp(_)
                | SneerError::Commit(_)
                | SneerError::Io(_)
        )
    }
}

/// Result type alias using SneerError
pub type SneerResult<T> = Result<T, SneerError>;
