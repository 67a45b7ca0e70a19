//! Evidence request shapes (spec.md §4.4).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Evidence {
    Commit { sha: String },
    Pr { number: u64, repo: String },
    GitLines {
        file: String,
        sha: String,
        start: u32,
        end: u32,
        snippet_hash: Option<String>,
    },
}

impl Evidence {
    /// Deterministic cache key for the validator's result cache.
    pub fn fingerprint(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    /// Confidence of a Stage 2 fallback match: 1.0 unique, 0.5 multiple.
    pub confidence: f64,
    /// For `git_lines`, the range actually matched (may differ from the
    /// requested range when Stage 2 discovers the snippet elsewhere).
    pub resolved_start: Option<u32>,
    pub resolved_end: Option<u32>,
    /// For `commit`, the fully resolved SHA.
    pub resolved_sha: Option<String>,
}

impl ValidationResult {
    pub fn ok(confidence: f64) -> Self {
        Self {
            valid: true,
            confidence,
            resolved_start: None,
            resolved_end: None,
            resolved_sha: None,
        }
    }
}
