//! Database error types.

use memoria_core::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl From<DbError> for StorageError {
    fn from(e: DbError) -> Self {
        StorageError(e.to_string())
    }
}
