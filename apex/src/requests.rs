//! Request/response DTOs for the external interface (spec.md §6). These are
//! the language-neutral shapes a caller (the out-of-scope CLI or an RPC
//! transport) sends and receives; `ApexService` is the only thing that
//! constructs or consumes them.

use serde::{Deserialize, Serialize};

use apex_core::pattern::Pattern;
use apex_core::task::{Task, TaskBrief};
use apex_ranker::{RankExplain, RankSignals, RankedPattern};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupRequest {
    pub task: Option<String>,
    pub signals: RankSignals,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupResponse {
    pub pack: apex_pack::Pack,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverRequest {
    pub signals: RankSignals,
    pub k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainRequest {
    pub id_or_alias: String,
    #[serde(default)]
    pub signals: Option<RankSignals>,
}

/// `pattern_with_scores` (§6): the stored pattern plus its rank breakdown
/// against the caller's signals, when signals were supplied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainResponse {
    pub pattern: Pattern,
    pub scores: Option<RankExplain>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCreateRequest {
    pub title: String,
    pub intent: String,
    pub task_type: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub brief: TaskBrief,
}

/// `tasks.update`: advance the phase DAG (§4.8). Checkpointing the brief
/// without moving phase is a separate operation, `tasks.checkpoint`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskUpdateRequest {
    pub task_id: String,
    pub next_phase: apex_core::task::TaskPhase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCheckpointRequest {
    pub task_id: String,
    pub brief: TaskBrief,
    pub confidence: f64,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskCompleteRequest {
    pub task_id: String,
    pub outcome: Option<String>,
    pub key_learning: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSimilarRequest {
    pub task_id: String,
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSimilarity {
    pub task_id: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSimilarResponse {
    pub neighbors: Vec<TaskSimilarity>,
}

pub use apex_reflection::{ReflectionReport, ReflectionRequest};

pub type TaskResponse = Task;
pub type DiscoverResponse = Vec<RankedPattern>;
