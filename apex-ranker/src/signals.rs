//! Request/response types for the ranker (spec.md §4.6).

use serde::{Deserialize, Serialize};

/// A framework observed in the caller's current context, e.g. `express@4.18.2`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkSignal {
    pub name: String,
    pub version: Option<String>,
}

/// The caller's task context, fed into scope/locality/policy scoring.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RankSignals {
    pub paths: Vec<String>,
    pub languages: Vec<String>,
    pub frameworks: Vec<FrameworkSignal>,
    pub repo: Option<String>,
    pub org: Option<String>,
}

/// One named sub-score's contribution, kept for the `explain` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubScoreExplain {
    pub name: String,
    pub points: f64,
    pub raw: f64,
    pub rationale: String,
}

/// Full breakdown for one ranked pattern, preserved for audit (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankExplain {
    pub sub_scores: Vec<SubScoreExplain>,
    pub total: f64,
}

/// A pattern placed at a rank, with its score and explanation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedPattern {
    pub pattern_id: String,
    pub score: f64,
    pub explain: RankExplain,
}
