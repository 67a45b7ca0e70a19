//! Task-lifecycle errors (spec.md §4.8).

use apex_core::task::TaskPhase;

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("task not found: {id}")]
    TaskNotFound { id: String },

    #[error("illegal phase transition: {from:?} -> {to:?}")]
    InvalidPhaseTransition { from: TaskPhase, to: TaskPhase },

    #[error("task {id} is already completed")]
    AlreadyCompleted { id: String },

    #[error("storage error: {0}")]
    Storage(#[from] apex_storage::StorageError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type TaskResult<T> = Result<T, TaskError>;
