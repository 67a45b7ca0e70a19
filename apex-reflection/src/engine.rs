//! The reflection engine (spec.md §4.5): the sole mutator of
//! `(alpha, beta, trust_score, usage_count, success_count)`.

use std::cell::RefCell;
use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use rusqlite::Connection;
use tracing::{info, warn};

use apex_core::config::ReflectionMode;
use apex_core::ids::PatternId;
use apex_core::pattern::{Pattern, PatternType, Provenance};
use apex_evidence::{Evidence, EvidenceValidator};
use apex_storage::{queries::reflection_log, PatternRepository, SqlAdapter};

use crate::error::{ReflectionError, ReflectionResult};
use crate::request::{
    AppliedUpdate, NewPatternDraft, ReflectionReport, ReflectionRequest, RequestOutcome,
    TrustUpdateClaim,
};

pub struct ReflectionEngine {
    adapter: Arc<dyn SqlAdapter>,
    repository: PatternRepository,
    validator: EvidenceValidator,
    mode: ReflectionMode,
}

impl ReflectionEngine {
    pub fn new(adapter: Arc<dyn SqlAdapter>, validator: EvidenceValidator, mode: ReflectionMode) -> Self {
        let repository = PatternRepository::new(adapter.clone());
        Self {
            adapter,
            repository,
            validator,
            mode,
        }
    }

    /// Run the full §4.5 pipeline inside one transaction. Any step failure
    /// rolls back every mutation made so far in this call.
    pub fn reflect(&self, request: ReflectionRequest) -> ReflectionResult<ReflectionReport> {
        let mode = request.options.mode_override.unwrap_or(self.mode);
        let failure: RefCell<Option<ReflectionError>> = RefCell::new(None);

        let txn_result = self.adapter.transaction(|conn| match self.run_steps(conn, &request, mode) {
            Ok(report) => Ok(report),
            Err(ReflectionError::Storage(e)) => Err(e),
            Err(other) => {
                *failure.borrow_mut() = Some(other);
                Err(apex_storage::StorageError::PatternNotFound {
                    id: "reflection rolled back".to_string(),
                })
            }
        });

        match txn_result {
            Ok(report) => {
                info!(
                    task_id = %request.task_id,
                    applied = report.applied_updates.len(),
                    created = report.created_patterns.len(),
                    "reflection applied"
                );
                Ok(report)
            }
            Err(storage_err) => match failure.into_inner() {
                Some(reflection_err) => Err(reflection_err),
                None => Err(storage_err.into()),
            },
        }
    }

    fn run_steps(
        &self,
        conn: &Connection,
        request: &ReflectionRequest,
        mode: ReflectionMode,
    ) -> ReflectionResult<ReflectionReport> {
        check_duplicate_trust_updates(&request.claims.trust_updates)?;

        let mut warnings = Vec::new();
        let known_trust_updates = self.check_known_patterns(request, mode, &mut warnings)?;

        self.validate_evidence(request, &known_trust_updates)?;

        let mut applied = Vec::with_capacity(known_trust_updates.len());
        for tu in &known_trust_updates {
            applied.push(self.apply_trust_update(tu)?);
        }

        let mut created_ids = Vec::new();
        for draft in &request.claims.new_patterns {
            created_ids.push(self.create_pattern(draft, PatternType::Codebase)?);
        }
        for draft in &request.claims.anti_patterns {
            created_ids.push(self.create_pattern(draft, PatternType::Anti)?);
        }

        self.record_audit_trail(conn, request, &applied, &created_ids, &known_trust_updates)?;

        Ok(ReflectionReport {
            applied_updates: applied,
            created_patterns: created_ids,
            warnings,
        })
    }

    /// Step 1: strict mode rejects any `trust_updates`/`patterns_used`
    /// reference to a pattern ID the store doesn't know; permissive mode
    /// downgrades the rejection to a warning and drops the trust update
    /// (a pattern that doesn't exist can't be mutated either way).
    fn check_known_patterns<'a>(
        &self,
        request: &'a ReflectionRequest,
        mode: ReflectionMode,
        warnings: &mut Vec<String>,
    ) -> ReflectionResult<Vec<&'a TrustUpdateClaim>> {
        let mut known = Vec::with_capacity(request.claims.trust_updates.len());
        for tu in &request.claims.trust_updates {
            if self.repository.get(&tu.pattern_id, false)?.is_some() {
                known.push(tu);
                continue;
            }
            match mode {
                ReflectionMode::Strict => {
                    return Err(ReflectionError::UnknownPatternId { id: tu.pattern_id.clone() })
                }
                ReflectionMode::Permissive => {
                    warn!(pattern_id = %tu.pattern_id, "unknown pattern id, downgrading to warning");
                    warnings.push(format!("unknown pattern id `{}`: trust update skipped", tu.pattern_id));
                }
            }
        }

        for usage in &request.claims.patterns_used {
            if self.repository.get(&usage.pattern_id, false)?.is_some() {
                continue;
            }
            match mode {
                ReflectionMode::Strict => {
                    return Err(ReflectionError::UnknownPatternId { id: usage.pattern_id.clone() })
                }
                ReflectionMode::Permissive => {
                    warnings.push(format!("unknown pattern id `{}` in patterns_used", usage.pattern_id));
                }
            }
        }

        Ok(known)
    }

    /// Step 3: every evidence item attached anywhere in the request must
    /// validate before any mutation happens.
    fn validate_evidence(
        &self,
        request: &ReflectionRequest,
        known_trust_updates: &[&TrustUpdateClaim],
    ) -> ReflectionResult<()> {
        for usage in &request.claims.patterns_used {
            for ev in &usage.evidence {
                self.validator.validate(ev)?;
            }
        }
        for draft in request.claims.new_patterns.iter().chain(request.claims.anti_patterns.iter()) {
            for ev in &draft.evidence {
                self.validator.validate(ev)?;
            }
        }
        for tu in known_trust_updates {
            for ev in &tu.evidence {
                self.validator.validate(ev)?;
            }
        }
        Ok(())
    }

    /// Steps 4-5: expand outcome to delta (or use the explicit delta),
    /// apply it, and recompute the pattern's posterior trust estimate.
    fn apply_trust_update(&self, tu: &TrustUpdateClaim) -> ReflectionResult<AppliedUpdate> {
        let (delta_alpha, delta_beta) = tu
            .resolved_delta()
            .ok_or_else(|| ReflectionError::MissingOutcomeOrDelta { id: tu.pattern_id.clone() })?;

        let mut pattern = self
            .repository
            .get(&tu.pattern_id, false)?
            .ok_or_else(|| ReflectionError::UnknownPatternId { id: tu.pattern_id.clone() })?;

        pattern.alpha += delta_alpha;
        pattern.beta += delta_beta;
        pattern.recompute_trust_score();
        pattern.usage_count += 1;
        if delta_alpha > delta_beta {
            pattern.success_count += 1;
        }
        pattern.updated_at = Utc::now();

        let saved = self.repository.upsert(pattern)?;
        Ok(AppliedUpdate {
            pattern_id: saved.id.to_string(),
            alpha: saved.alpha,
            beta: saved.beta,
            trust_score: saved.trust_score,
        })
    }

    /// Step 6: auto-created patterns start at Beta(1, 1) — the uninformative
    /// prior every pattern carries per the `alpha >= 1, beta >= 1` invariant —
    /// are assigned an alias the same way a manually-created pattern would
    /// be, and carry the caller's tags through untouched.
    fn create_pattern(&self, draft: &NewPatternDraft, pattern_type: PatternType) -> ReflectionResult<String> {
        let now = Utc::now();
        let id = match pattern_type {
            PatternType::Anti => PatternId::new_auto_anti(),
            _ => PatternId::new_auto_codebase(),
        };

        let mut pattern = Pattern {
            id,
            schema_version: 1,
            pattern_version: 1,
            pattern_type,
            title: draft.title.clone(),
            summary: draft.summary.clone(),
            trust_score: 0.0,
            alpha: 1.0,
            beta: 1.0,
            usage_count: 0,
            success_count: 0,
            created_at: now,
            updated_at: now,
            alias: None,
            provenance: Provenance::AutoCreated,
            invalid: false,
            invalid_reason: None,
            pattern_digest: None,
            facets: draft.facets.clone(),
            semantics: draft.semantics.clone(),
            snippets: draft.snippets.clone(),
            half_life_days: None,
        };
        pattern.facets.tags = draft.tags.clone();
        pattern.recompute_trust_score();

        let saved = self.repository.upsert(pattern)?;
        self.repository.assign_alias(saved.id.as_str(), &saved.title)?;
        Ok(saved.id.to_string())
    }

    /// Step 7: append-only audit trail. `pattern_evidence` rows are keyed
    /// by `reflection_id` so a full reflection can be reconstructed later.
    fn record_audit_trail(
        &self,
        conn: &Connection,
        request: &ReflectionRequest,
        applied: &[AppliedUpdate],
        created_ids: &[String],
        known_trust_updates: &[&TrustUpdateClaim],
    ) -> ReflectionResult<()> {
        let applied_json = serde_json::to_string(applied)?;
        let created_json = serde_json::to_string(created_ids)?;
        let learnings_json = serde_json::to_string(&request.claims.learnings)?;

        let reflection_id = reflection_log::insert_reflection(
            conn,
            &request.task_id,
            request_outcome_str(request.outcome),
            &applied_json,
            &created_json,
            &learnings_json,
        )?;

        for tu in known_trust_updates {
            for ev in &tu.evidence {
                let payload = serde_json::to_string(ev)?;
                reflection_log::insert_pattern_evidence(
                    conn,
                    &tu.pattern_id,
                    Some(reflection_id),
                    evidence_kind(ev),
                    &payload,
                )?;
            }
        }

        for usage in &request.claims.patterns_used {
            let payload = serde_json::to_string(usage)?;
            reflection_log::insert_task_evidence(conn, &request.task_id, "pattern_used", &payload)?;
        }

        Ok(())
    }
}

fn check_duplicate_trust_updates(trust_updates: &[TrustUpdateClaim]) -> ReflectionResult<()> {
    let mut seen = HashSet::new();
    for tu in trust_updates {
        if !seen.insert(tu.pattern_id.as_str()) {
            return Err(ReflectionError::DuplicateTrustUpdate { id: tu.pattern_id.clone() });
        }
    }
    Ok(())
}

fn request_outcome_str(outcome: RequestOutcome) -> &'static str {
    match outcome {
        RequestOutcome::Success => "success",
        RequestOutcome::Partial => "partial",
        RequestOutcome::Failure => "failure",
    }
}

fn evidence_kind(ev: &Evidence) -> &'static str {
    match ev {
        Evidence::Commit { .. } => "commit",
        Evidence::Pr { .. } => "pr",
        Evidence::GitLines { .. } => "git_lines",
    }
}
