//! Pack-builder errors.

#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("storage error: {0}")]
    Storage(#[from] apex_storage::StorageError),

    #[error("ranker error: {0}")]
    Ranker(#[from] apex_ranker::RankerError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type PackResult<T> = Result<T, PackError>;
