//! Reflection request/response shapes (spec.md §4.5, §6 `reflect`).

use serde::{Deserialize, Serialize};

use apex_core::pattern::{Facets, Semantics, Snippet};
use apex_core::trust::Outcome;
use apex_evidence::Evidence;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOutcome {
    Success,
    Partial,
    Failure,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternUsage {
    pub pattern_id: String,
    pub evidence: Vec<Evidence>,
}

/// A trust update for one existing pattern. `outcome` is expanded to a
/// delta per the §4.5 step-4 table; an explicit `delta` takes precedence if
/// both are supplied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustUpdateClaim {
    pub pattern_id: String,
    pub outcome: Option<Outcome>,
    pub delta: Option<(f64, f64)>,
    pub evidence: Vec<Evidence>,
}

impl TrustUpdateClaim {
    pub fn resolved_delta(&self) -> Option<(f64, f64)> {
        self.delta.or_else(|| self.outcome.map(Outcome::deltas))
    }
}

/// A candidate new or anti-pattern. The engine assigns the ID, provenance,
/// and 4-segment auto ID policy; `tags` survive verbatim from the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewPatternDraft {
    pub title: String,
    pub summary: String,
    pub tags: Vec<String>,
    pub facets: Facets,
    pub semantics: Semantics,
    pub snippets: Vec<Snippet>,
    pub evidence: Vec<Evidence>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectionClaims {
    pub patterns_used: Vec<PatternUsage>,
    pub trust_updates: Vec<TrustUpdateClaim>,
    pub new_patterns: Vec<NewPatternDraft>,
    pub anti_patterns: Vec<NewPatternDraft>,
    pub learnings: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectionOptions {
    /// Overrides the engine's configured strict/permissive mode for this
    /// request only.
    pub mode_override: Option<apex_core::config::ReflectionMode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionRequest {
    pub task_id: String,
    pub outcome: RequestOutcome,
    #[serde(default)]
    pub claims: ReflectionClaims,
    #[serde(default)]
    pub options: ReflectionOptions,
}

/// A single applied trust update, returned to the caller with the new
/// triple so it can confirm what changed (§4.5: "return the list of
/// applied updates with new (α,β,trust) triples").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedUpdate {
    pub pattern_id: String,
    pub alpha: f64,
    pub beta: f64,
    pub trust_score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReflectionReport {
    pub applied_updates: Vec<AppliedUpdate>,
    pub created_patterns: Vec<String>,
    pub warnings: Vec<String>,
}
