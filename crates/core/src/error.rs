use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// A malformed submission. Never retried automatically; the caller must
/// correct the input and resubmit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("rank {0} is out of range: must be between 1 and 5")]
    RankOutOfRange(u8),

    #[error("notes must not be blank")]
    BlankNotes,

    #[error("at least one photo reference is required")]
    NoPhotoRefs,

    #[error("photo references must not be blank")]
    BlankPhotoRef,

    #[error("dish type bucket must not be blank")]
    BlankDishType,
}
