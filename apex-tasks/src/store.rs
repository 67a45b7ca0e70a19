//! Task lifecycle (C8) and similarity maintenance (C9), spec.md §4.8-§4.9.

use std::cell::RefCell;
use std::sync::Arc;

use chrono::Utc;
use rusqlite::Connection;
use tracing::info;

use apex_core::ids::new_task_id;
use apex_core::task::{Task, TaskBrief, TaskPhase, TaskSimilarityRow, TaskStatus};
use apex_storage::queries::task_crud;
use apex_storage::{SqlAdapter, StorageError};

use crate::error::{TaskError, TaskResult};
use crate::similarity::similarity;

pub struct TaskStore {
    adapter: Arc<dyn SqlAdapter>,
}

impl TaskStore {
    pub fn new(adapter: Arc<dyn SqlAdapter>) -> Self {
        Self { adapter }
    }

    /// Create a task: phase = ARCHITECT, confidence = 0.3, then fire
    /// similarity computation against every other active task.
    pub fn create(&self, title: String, intent: String, task_type: String, tags: Vec<String>, brief: TaskBrief) -> TaskResult<Task> {
        let now = Utc::now();
        let task = Task {
            id: new_task_id(),
            human_id: None,
            title,
            intent,
            task_type,
            status: TaskStatus::Active,
            phase: TaskPhase::Architect,
            confidence: 0.3,
            tags,
            created_at: now,
            updated_at: now,
            completed_at: None,
            duration_ms: None,
            outcome: None,
            key_learning: None,
            brief,
        };

        self.adapter.transaction(|conn| {
            task_crud::insert(conn, &task)?;
            recompute_similarity_for(conn, &task)?;
            Ok(())
        })?;

        info!(task_id = %task.id, "task created");
        Ok(task)
    }

    pub fn get(&self, task_id: &str) -> TaskResult<Task> {
        self.adapter
            .with_connection(|conn| task_crud::get(conn, task_id))?
            .ok_or_else(|| TaskError::TaskNotFound { id: task_id.to_string() })
    }

    /// Move a task to the next phase, enforcing the ARCHITECT → ... DAG
    /// (spec.md §4.8); REVIEWER/DOCUMENTER may be skipped, nothing else.
    pub fn transition_phase(&self, task_id: &str, next: TaskPhase) -> TaskResult<Task> {
        self.run(task_id, |conn, task_id| {
            let mut task = fetch(conn, task_id)?;
            if !task.phase.can_transition_to(next) {
                return Err(TaskError::InvalidPhaseTransition { from: task.phase, to: next });
            }
            task.phase = next;
            task.updated_at = Utc::now();
            task_crud::update(conn, &task)?;
            Ok(task)
        })
    }

    /// A checkpoint persists brief/confidence/tags in place without moving
    /// phase; collaborators call this to save partial progress.
    pub fn checkpoint(&self, task_id: &str, brief: TaskBrief, confidence: f64, tags: Vec<String>) -> TaskResult<Task> {
        self.run(task_id, |conn, task_id| {
            let mut task = fetch(conn, task_id)?;
            task.brief = brief;
            task.confidence = confidence;
            task.tags = tags;
            task.updated_at = Utc::now();
            task_crud::update(conn, &task)?;
            Ok(task)
        })
    }

    pub fn record_file_touch(&self, task_id: &str, file_path: &str) -> TaskResult<()> {
        self.adapter
            .transaction(|conn| task_crud::insert_file_touch(conn, task_id, file_path))?;
        Ok(())
    }

    pub fn record_evidence(&self, task_id: &str, kind: &str, payload_json: &str) -> TaskResult<()> {
        Ok(self
            .adapter
            .transaction(|conn| apex_storage::queries::reflection_log::insert_task_evidence(conn, task_id, kind, payload_json))?)
    }

    /// Complete a task: sets status/outcome/duration and clears its
    /// similarity cache rows (§4.9).
    pub fn complete(&self, task_id: &str, outcome: Option<String>, key_learning: Option<String>) -> TaskResult<Task> {
        let completed = self.run(task_id, |conn, task_id| {
            let mut task = fetch(conn, task_id)?;
            if task.status == TaskStatus::Completed {
                return Err(TaskError::AlreadyCompleted { id: task_id.to_string() });
            }
            let now = Utc::now();
            task.status = TaskStatus::Completed;
            task.completed_at = Some(now);
            task.duration_ms = Some((now - task.created_at).num_milliseconds());
            task.outcome = outcome.clone();
            task.key_learning = key_learning.clone();
            task.updated_at = now;
            task_crud::update(conn, &task)?;
            task_crud::clear_similarity(conn, task_id)?;
            Ok(task)
        })?;
        info!(task_id = %completed.id, "task completed");
        Ok(completed)
    }

    /// Cached similarity neighbours, most similar first.
    pub fn similar(&self, task_id: &str, limit: usize) -> TaskResult<Vec<(String, f64)>> {
        Ok(self.adapter.with_connection(|conn| task_crud::list_similar(conn, task_id, limit))?)
    }

    /// Run a fallible step inside one transaction, recovering a typed
    /// `TaskError` across the adapter's fixed `StorageResult` boundary the
    /// same way the reflection engine does: a non-storage error is stashed
    /// in a `RefCell` and a rollback is forced via a dummy storage error.
    fn run<T>(&self, task_id: &str, f: impl FnOnce(&Connection, &str) -> TaskResult<T>) -> TaskResult<T> {
        let failure: RefCell<Option<TaskError>> = RefCell::new(None);
        let result = self.adapter.transaction(|conn| match f(conn, task_id) {
            Ok(v) => Ok(v),
            Err(TaskError::Storage(e)) => Err(e),
            Err(other) => {
                *failure.borrow_mut() = Some(other);
                Err(StorageError::TaskNotFound { id: "rolled back".to_string() })
            }
        });
        match result {
            Ok(v) => Ok(v),
            Err(storage_err) => match failure.into_inner() {
                Some(task_err) => Err(task_err),
                None => Err(storage_err.into()),
            },
        }
    }
}

fn fetch(conn: &Connection, task_id: &str) -> TaskResult<Task> {
    task_crud::get(conn, task_id)?.ok_or_else(|| TaskError::TaskNotFound { id: task_id.to_string() })
}

/// Compare `task` against every other active task and cache the pairs
/// that clear the 0.3 cache-worthiness threshold (§4.9).
fn recompute_similarity_for(conn: &Connection, task: &Task) -> apex_storage::StorageResult<()> {
    let others = task_crud::list_active(conn)?;
    for other in &others {
        if other.id == task.id {
            continue;
        }
        let score = similarity(task, other);
        if let Some(row) = TaskSimilarityRow::new_if_cacheable(&task.id, &other.id, score) {
            task_crud::upsert_similarity(conn, &row.task_a, &row.task_b, row.score)?;
        }
    }
    Ok(())
}
