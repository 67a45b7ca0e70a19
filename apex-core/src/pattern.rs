//! The Pattern entity and its facets (spec.md §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::PatternId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PatternType {
    Codebase,
    Lang,
    Anti,
    Failure,
    Policy,
    Test,
    Migration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    Manual,
    AutoCreated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkRef {
    pub name: String,
    /// Optional semver range, e.g. `^4.0.0`.
    pub range: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Error,
    Keyword,
    Scenario,
    FileGlob,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub kind: TriggerKind,
    pub value: String,
    /// True if `value` is a regex and has been validated as compilable
    /// (see `apex_core::trust`'s sibling module doc: RE2-safety itself is
    /// a declared property of the author, not independently re-verified
    /// against an RE2 engine — see DESIGN.md).
    pub is_regex: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VocabTermType {
    Synonym,
    Abbreviation,
    DomainTerm,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabTerm {
    pub term: String,
    pub term_type: VocabTermType,
    pub weight: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Facets {
    pub languages: Vec<String>,
    pub frameworks: Vec<FrameworkRef>,
    pub paths: Vec<String>,
    pub repos: Vec<String>,
    pub task_types: Vec<String>,
    pub envs: Vec<String>,
    pub tags: Vec<String>,
}

impl Facets {
    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
            && self.frameworks.is_empty()
            && self.paths.is_empty()
            && self.repos.is_empty()
            && self.task_types.is_empty()
            && self.envs.is_empty()
            && self.tags.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Semantics {
    pub key_insight: Option<String>,
    pub when_to_use: Option<String>,
    pub common_pitfalls: Vec<String>,
    pub keywords: Vec<String>,
    pub search_index: Option<String>,
    pub triggers: Vec<Trigger>,
    pub vocabulary: Vec<VocabTerm>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    pub snippet_id: String,
    pub label: String,
    pub language: String,
    pub file: Option<String>,
    pub line_start: Option<u32>,
    pub line_end: Option<u32>,
    pub content: String,
    pub size_bytes: usize,
}

impl Snippet {
    pub fn line_count(&self) -> usize {
        self.content.lines().count().max(1)
    }
}

/// The full Pattern record (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub id: PatternId,
    pub schema_version: u32,
    pub pattern_version: u32,
    #[serde(rename = "type")]
    pub pattern_type: PatternType,
    pub title: String,
    pub summary: String,
    pub trust_score: f64,
    pub alpha: f64,
    pub beta: f64,
    pub usage_count: u64,
    pub success_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub alias: Option<String>,
    pub provenance: Provenance,
    pub invalid: bool,
    pub invalid_reason: Option<String>,
    /// SHA-256 of `json_canonical`; recomputed, never trusted from input.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern_digest: Option<String>,
    #[serde(default)]
    pub facets: Facets,
    #[serde(default)]
    pub semantics: Semantics,
    #[serde(default)]
    pub snippets: Vec<Snippet>,
    /// Half-life in days used by the ranker's Freshness sub-score; defaults
    /// to 90 when absent (§4.6).
    pub half_life_days: Option<f64>,
}

impl Pattern {
    /// Recompute `trust_score` from `(alpha, beta)` per the deterministic
    /// posterior estimate (§8 invariant: `trust_score = f(alpha, beta)`).
    pub fn recompute_trust_score(&mut self) {
        self.trust_score = crate::trust::trust_score(self.alpha, self.beta);
    }
}
