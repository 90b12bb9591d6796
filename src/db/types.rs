use thiserror::Error;

use crate::error::ColumnError;
use crate::types::RowKey;

#[derive(Debug, Error)]
pub enum RowStoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),
    /// The packed-column engine refused the row (bad payload, oversize
    /// encode, ...). Save aborts before anything reaches the database.
    #[error(transparent)]
    Column(#[from] ColumnError),
    /// Stored bytes under this key are not a row object.
    #[error("stored row `{key}` is corrupt: {reason}")]
    CorruptRow { key: RowKey, reason: String },
    #[error("no row with key `{0}`")]
    NotFound(RowKey),
}

impl From<redb::DatabaseError> for RowStoreError {
    fn from(e: redb::DatabaseError) -> Self {
        RowStoreError::Redb(e.into())
    }
}

impl From<redb::TransactionError> for RowStoreError {
    fn from(e: redb::TransactionError) -> Self {
        RowStoreError::Redb(e.into())
    }
}

impl From<redb::TableError> for RowStoreError {
    fn from(e: redb::TableError) -> Self {
        RowStoreError::Redb(e.into())
    }
}

impl From<redb::CommitError> for RowStoreError {
    fn from(e: redb::CommitError) -> Self {
        RowStoreError::Redb(e.into())
    }
}

impl From<redb::StorageError> for RowStoreError {
    fn from(e: redb::StorageError) -> Self {
        RowStoreError::Redb(e.into())
    }
}
