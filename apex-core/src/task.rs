//! The Task entity, its brief, and collaborator logs (spec.md §3, §4.8).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Active,
    Completed,
    Failed,
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskPhase {
    Architect,
    Builder,
    #[serde(rename = "BUILDER_VALIDATOR")]
    BuilderValidator,
    Validator,
    Reviewer,
    Documenter,
    Research,
}

impl TaskPhase {
    /// Phases this phase may legally transition to (§4.8 phase DAG).
    /// REVIEWER and DOCUMENTER are optional: BUILDER_VALIDATOR may skip
    /// straight past them only via VALIDATOR; completion is modeled
    /// separately (`TaskStore::complete`), not as a phase.
    pub fn allowed_next(self) -> &'static [TaskPhase] {
        use TaskPhase::*;
        match self {
            Architect => &[Builder, Research],
            Research => &[BuilderValidator, Builder],
            Builder => &[BuilderValidator],
            BuilderValidator => &[Validator],
            Validator => &[Reviewer, Documenter],
            Reviewer => &[Documenter],
            Documenter => &[],
        }
    }

    pub fn can_transition_to(self, next: TaskPhase) -> bool {
        self.allowed_next().contains(&next)
    }
}

/// Opaque structured brief, stored as JSON (spec.md §3 lists the fields but
/// leaves their shape to the caller's domain — we model the named fields as
/// optional JSON values so the store never needs to interpret them).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskBrief {
    pub tl_dr: Option<String>,
    pub objectives: Vec<serde_json::Value>,
    pub constraints: Vec<serde_json::Value>,
    pub acceptance_criteria: Vec<serde_json::Value>,
    pub plan: Vec<serde_json::Value>,
    pub facts: Vec<serde_json::Value>,
    pub snippets: Vec<serde_json::Value>,
    pub risks: Vec<serde_json::Value>,
    pub open_questions: Vec<serde_json::Value>,
    pub in_flight: Vec<serde_json::Value>,
    pub test_scaffold: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub human_id: Option<String>,
    pub title: String,
    pub intent: String,
    pub task_type: String,
    pub status: TaskStatus,
    pub phase: TaskPhase,
    pub confidence: f64,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub outcome: Option<String>,
    pub key_learning: Option<String>,
    pub brief: TaskBrief,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    Commit,
    Pr,
    GitLines,
}

/// Append-only typed evidence log row (`task_evidence`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvidenceRow {
    pub task_id: String,
    pub kind: EvidenceKind,
    pub payload: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

/// Append-only file-touch log row (`task_files`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFileRow {
    pub task_id: String,
    pub file_path: String,
    pub touched_at: DateTime<Utc>,
}

/// Symmetric similarity cache row, canonically ordered `task_a < task_b`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSimilarityRow {
    pub task_a: String,
    pub task_b: String,
    pub score: f64,
}

impl TaskSimilarityRow {
    /// Build a row with canonical ordering, or `None` if `score <= 0.3`
    /// (cache-worthiness threshold, §4.9).
    pub fn new_if_cacheable(a: &str, b: &str, score: f64) -> Option<Self> {
        if score <= 0.3 {
            return None;
        }
        let (task_a, task_b) = if a < b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        };
        Some(Self { task_a, task_b, score })
    }
}
