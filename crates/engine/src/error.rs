use platerank_core::{CoreError, ValidationError};
use platerank_storage::{IdentityKind, StorageError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("{kind} not found: {id}")]
    NotFound { kind: IdentityKind, id: String },

    #[error("conflicting concurrent submission, retry: {0}")]
    ConflictAbort(String),
}

impl From<StorageError> for EngineError {
    fn from(e: StorageError) -> Self {
        match e {
            // A bounded lock-wait timeout is transient; the caller retries
            // the whole submission.
            StorageError::Busy(msg) => Self::ConflictAbort(msg),
            other => Self::Storage(other),
        }
    }
}
