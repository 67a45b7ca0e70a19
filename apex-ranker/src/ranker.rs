//! Candidate generation and scoring (spec.md §4.6).

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use apex_core::config::RankingConfig;
use apex_core::pattern::Pattern;
use apex_storage::PatternRepository;

use crate::error::RankerResult;
use crate::score::{freshness_subscore, locality_subscore, policy_subscore, scope_subscore, trust_subscore};
use crate::signals::{RankExplain, RankSignals, RankedPattern, SubScoreExplain};

pub struct Ranker {
    repository: Arc<PatternRepository>,
    config: RankingConfig,
}

impl Ranker {
    pub fn new(repository: Arc<PatternRepository>, config: RankingConfig) -> Self {
        Self { repository, config }
    }

    /// Produce the top-`k` patterns for `signals`, each with a preserved
    /// `explain` breakdown, tie-broken by ascending pattern ID.
    pub fn rank(&self, signals: &RankSignals, k: usize) -> RankerResult<Vec<RankedPattern>> {
        let all = self.repository.list_all()?;
        let candidates = generate_candidates(all, signals, self.config.candidate_cap);
        debug!(candidate_count = candidates.len(), "ranker candidate generation complete");

        let now = Utc::now();
        let mut scored: Vec<RankedPattern> = candidates
            .into_iter()
            .map(|pattern| score_pattern(&pattern, signals, now, self.config.default_half_life_days))
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.pattern_id.cmp(&b.pattern_id))
        });
        scored.truncate(k);
        Ok(scored)
    }
}

/// Apply candidate generation rules (§4.6): always include global-scope
/// patterns when any language or path signal is present; exclude patterns
/// whose declared languages are non-empty and disjoint with the signal's.
/// Sorted by ID ascending and capped at `cap` before scoring.
fn generate_candidates(patterns: Vec<Pattern>, signals: &RankSignals, cap: usize) -> Vec<Pattern> {
    let mut candidates: Vec<Pattern> = patterns
        .into_iter()
        .filter(|pattern| {
            if pattern.facets.languages.is_empty() {
                // Rule (a): globals (and path/framework-only patterns) always pass.
                return true;
            }
            // Rule (b): non-empty language facet must intersect the signal's.
            signals
                .languages
                .iter()
                .any(|s| pattern.facets.languages.iter().any(|l| l.eq_ignore_ascii_case(s)))
        })
        .collect();

    candidates.sort_by(|a, b| a.id.cmp(&b.id));
    candidates.truncate(cap);
    candidates
}

fn score_pattern(pattern: &Pattern, signals: &RankSignals, now: chrono::DateTime<Utc>, default_half_life_days: f64) -> RankedPattern {
    let (scope_points, scope_raw, scope_reason) = scope_subscore(pattern, signals);
    let (trust_points, trust_raw, trust_reason) = trust_subscore(pattern);
    let (freshness_points, freshness_raw, freshness_reason) = freshness_subscore(pattern, now, default_half_life_days);
    let (locality_points, locality_raw, locality_reason) = locality_subscore(pattern, signals);
    let (policy_points, policy_raw, policy_reason) = policy_subscore(pattern, signals);

    let total = scope_points + trust_points + freshness_points + locality_points + policy_points;

    let sub_scores = vec![
        SubScoreExplain { name: "scope".to_string(), points: scope_points, raw: scope_raw, rationale: scope_reason },
        SubScoreExplain { name: "trust".to_string(), points: trust_points, raw: trust_raw, rationale: trust_reason },
        SubScoreExplain { name: "freshness".to_string(), points: freshness_points, raw: freshness_raw, rationale: freshness_reason },
        SubScoreExplain { name: "locality".to_string(), points: locality_points, raw: locality_raw, rationale: locality_reason },
        SubScoreExplain { name: "policy".to_string(), points: policy_points, raw: policy_raw, rationale: policy_reason },
    ];

    RankedPattern {
        pattern_id: pattern.id.as_str().to_string(),
        score: total,
        explain: RankExplain { sub_scores, total },
    }
}
