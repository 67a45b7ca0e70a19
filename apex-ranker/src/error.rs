//! Ranker errors (candidate generation only touches storage).

#[derive(Debug, thiserror::Error)]
pub enum RankerError {
    #[error("storage error: {0}")]
    Storage(#[from] apex_storage::StorageError),
}

pub type RankerResult<T> = Result<T, RankerError>;
