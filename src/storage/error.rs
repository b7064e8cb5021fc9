use thiserror::Error;

use super::traits::Collection;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{} not found", .collection.label())]
    NotFound { collection: Collection, id: String },

    #[error("{} with id '{id}' already exists", .collection.label())]
    DuplicateId { collection: Collection, id: String },

    #[error("invalid document: {0}")]
    InvalidDocument(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] rusqlite::Error),

    #[error("storage is closed")]
    Closed,
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
