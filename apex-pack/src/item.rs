//! The pack's output shape (spec.md §4.7).

use serde::{Deserialize, Serialize};

use apex_core::pattern::{PatternType, Snippet};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackItem {
    pub id: String,
    pub title: String,
    pub summary: String,
    #[serde(rename = "type")]
    pub pattern_type: PatternType,
    pub trust_score: f64,
    pub score: f64,
    pub snippets: Vec<Snippet>,
    /// IDs of other admitted anti-patterns/tests this item's own text
    /// mentions; their bodies are never re-emitted here (§4.7 step 4).
    #[serde(default)]
    pub cross_references: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackMeta {
    pub total_ranked: usize,
    pub considered: usize,
    pub included: usize,
    pub budget_bytes: usize,
    pub bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gzip_bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explain: Option<bool>,
    #[serde(default)]
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pack {
    pub task: String,
    pub candidates: Vec<PackItem>,
    pub anti_patterns: Vec<PackItem>,
    pub policies: Vec<PackItem>,
    pub tests: Vec<PackItem>,
    pub meta: PackMeta,
}
