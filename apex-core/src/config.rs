//! Explicit option structs replacing "config objects" (spec.md §9), read
//! once at start-up from the environment variables named in §6 and then
//! passed as constructor parameters — never read again at point of use.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReflectionMode {
    Strict,
    Permissive,
}

impl Default for ReflectionMode {
    fn default() -> Self {
        ReflectionMode::Strict
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Default candidate cap before scoring (§4.6).
    pub candidate_cap: usize,
    /// Default half-life in days when a pattern doesn't specify one.
    pub default_half_life_days: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            candidate_cap: 50,
            default_half_life_days: 90.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackConfig {
    pub budget_bytes: usize,
    pub top_candidates_quota: usize,
    pub antis_quota: usize,
    pub tests_quota: usize,
    pub snippet_lines_min: usize,
    pub high_score_threshold: f64,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            budget_bytes: 8192,
            top_candidates_quota: 5,
            antis_quota: 2,
            tests_quota: 2,
            snippet_lines_min: 8,
            high_score_threshold: 80.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidenceConfig {
    pub cache_ttl_secs: u64,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub pr_allowlist: Vec<String>,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 300,
            timeout_ms: 1000,
            max_retries: 3,
            backoff_base_ms: 100,
            pr_allowlist: Vec::new(),
        }
    }
}

/// Top-level configuration aggregating all subsystem configs, the way the
/// teacher aggregates subsystem configs into one top-level struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApexConfig {
    pub db_path: PathBuf,
    pub reflection_mode: ReflectionMode,
    pub repo_path: PathBuf,
    pub ranking: RankingConfig,
    pub pack: PackConfig,
    pub evidence: EvidenceConfig,
}

impl Default for ApexConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(".apex/patterns.db"),
            reflection_mode: ReflectionMode::Strict,
            repo_path: PathBuf::from("."),
            ranking: RankingConfig::default(),
            pack: PackConfig::default(),
            evidence: EvidenceConfig::default(),
        }
    }
}

impl ApexConfig {
    /// Read `APEX_PATTERNS_DB` and `APEX_REFLECTION_MODE` once and fold
    /// them into a config struct; all other fields take their defaults
    /// unless overridden by direct field assignment by the caller.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(path) = std::env::var("APEX_PATTERNS_DB") {
            config.db_path = PathBuf::from(path);
        }
        if let Ok(mode) = std::env::var("APEX_REFLECTION_MODE") {
            config.reflection_mode = match mode.to_ascii_lowercase().as_str() {
                "permissive" => ReflectionMode::Permissive,
                _ => ReflectionMode::Strict,
            };
        }
        config
    }
}
