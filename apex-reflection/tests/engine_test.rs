use std::sync::Arc;

use apex_core::config::{EvidenceConfig, ReflectionMode};
use apex_core::ids::PatternId;
use apex_core::pattern::{Facets, Pattern, PatternType, Provenance, Semantics};
use apex_evidence::EvidenceValidator;
use apex_reflection::{
    NewPatternDraft, PatternUsage, ReflectionClaims, ReflectionEngine, ReflectionError,
    ReflectionRequest, RequestOutcome, TrustUpdateClaim,
};
use apex_storage::adapter::RusqliteAdapter;
use apex_storage::migrations::run_migrations;
use apex_storage::{PatternRepository, SqlAdapter};
use chrono::Utc;
use tempfile::TempDir;

fn sample_pattern(id: &str) -> Pattern {
    let now = Utc::now();
    Pattern {
        id: PatternId::parse(id).unwrap(),
        schema_version: 1,
        pattern_version: 1,
        pattern_type: PatternType::Codebase,
        title: "Sample".into(),
        summary: "A pattern".into(),
        trust_score: 0.3,
        alpha: 1.0,
        beta: 1.0,
        usage_count: 0,
        success_count: 0,
        created_at: now,
        updated_at: now,
        alias: None,
        provenance: Provenance::Manual,
        invalid: false,
        invalid_reason: None,
        pattern_digest: None,
        facets: Facets::default(),
        semantics: Semantics::default(),
        snippets: Vec::new(),
        half_life_days: None,
    }
}

fn seed_task(adapter: &RusqliteAdapter, id: &str) {
    adapter
        .with_connection(|conn| {
            conn.execute(
                "INSERT INTO tasks (id, human_id, title, intent, task_type, status, phase,
                    confidence, tags, created_at, updated_at, completed_at, duration_ms,
                    outcome, key_learning, brief)
                 VALUES (?1, NULL, 'title', 'intent', 'feature', 'active', 'ARCHITECT',
                    0.3, '[]', ?2, ?2, NULL, NULL, NULL, NULL, '{}')",
                rusqlite::params![id, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
        .unwrap();
}

#[test]
fn full_pipeline_applies_updates_and_creates_patterns() {
    let adapter = Arc::new(RusqliteAdapter::open_in_memory().unwrap());
    adapter.with_connection(|conn| run_migrations(conn).map(|_| ())).unwrap();
    let repository = PatternRepository::new(adapter.clone());
    repository.upsert(sample_pattern("TEST:A")).unwrap();
    seed_task(&adapter, "task-1");

    let dir = TempDir::new().unwrap();
    git2::Repository::init(dir.path()).unwrap();
    let validator = EvidenceValidator::open(dir.path(), EvidenceConfig::default()).unwrap();
    let engine = ReflectionEngine::new(adapter.clone(), validator, ReflectionMode::Strict);

    let request = ReflectionRequest {
        task_id: "task-1".to_string(),
        outcome: RequestOutcome::Success,
        claims: ReflectionClaims {
            patterns_used: vec![PatternUsage {
                pattern_id: "TEST:A".to_string(),
                evidence: Vec::new(),
            }],
            trust_updates: vec![TrustUpdateClaim {
                pattern_id: "TEST:A".to_string(),
                outcome: Some(apex_core::trust::Outcome::WorkedPerfectly),
                delta: None,
                evidence: Vec::new(),
            }],
            new_patterns: vec![NewPatternDraft {
                title: "Learned thing".to_string(),
                summary: "summary".to_string(),
                tags: vec!["perf".to_string()],
                ..Default::default()
            }],
            anti_patterns: vec![NewPatternDraft {
                title: "Don't do this".to_string(),
                summary: "summary".to_string(),
                ..Default::default()
            }],
            learnings: vec!["use connection pooling".to_string()],
        },
        options: Default::default(),
    };

    let report = engine.reflect(request).unwrap();
    assert_eq!(report.applied_updates.len(), 1);
    assert_eq!(report.applied_updates[0].alpha, 2.0);
    assert_eq!(report.applied_updates[0].beta, 1.0);
    assert_eq!(report.created_patterns.len(), 2);

    let updated = repository.get("TEST:A", false).unwrap().unwrap();
    assert_eq!(updated.usage_count, 1);
    assert_eq!(updated.success_count, 1);

    let anti_id = report
        .created_patterns
        .iter()
        .find(|id| id.contains(":ANTI:"))
        .unwrap();
    let anti = repository.get(anti_id, false).unwrap().unwrap();
    assert_eq!(anti.pattern_type, PatternType::Anti);
    assert_eq!(anti.provenance, Provenance::AutoCreated);
}

#[test]
fn strict_mode_rejects_unknown_pattern_and_rolls_back() {
    let adapter = Arc::new(RusqliteAdapter::open_in_memory().unwrap());
    adapter.with_connection(|conn| run_migrations(conn).map(|_| ())).unwrap();
    let repository = PatternRepository::new(adapter.clone());
    repository.upsert(sample_pattern("TEST:A")).unwrap();
    seed_task(&adapter, "task-2");

    let dir = TempDir::new().unwrap();
    git2::Repository::init(dir.path()).unwrap();
    let validator = EvidenceValidator::open(dir.path(), EvidenceConfig::default()).unwrap();
    let engine = ReflectionEngine::new(adapter.clone(), validator, ReflectionMode::Strict);

    let request = ReflectionRequest {
        task_id: "task-2".to_string(),
        outcome: RequestOutcome::Success,
        claims: ReflectionClaims {
            trust_updates: vec![
                TrustUpdateClaim {
                    pattern_id: "TEST:A".to_string(),
                    outcome: Some(apex_core::trust::Outcome::WorkedPerfectly),
                    delta: None,
                    evidence: Vec::new(),
                },
                TrustUpdateClaim {
                    pattern_id: "TEST:NOPE".to_string(),
                    outcome: Some(apex_core::trust::Outcome::WorkedPerfectly),
                    delta: None,
                    evidence: Vec::new(),
                },
            ],
            ..Default::default()
        },
        options: Default::default(),
    };

    let err = engine.reflect(request).unwrap_err();
    assert!(matches!(err, ReflectionError::UnknownPatternId { .. }));

    // first trust update must not have been applied: the whole transaction
    // rolled back.
    let unchanged = repository.get("TEST:A", false).unwrap().unwrap();
    assert_eq!(unchanged.alpha, 1.0);
    assert_eq!(unchanged.usage_count, 0);
}

#[test]
fn permissive_mode_downgrades_unknown_pattern_to_warning() {
    let adapter = Arc::new(RusqliteAdapter::open_in_memory().unwrap());
    adapter.with_connection(|conn| run_migrations(conn).map(|_| ())).unwrap();
    seed_task(&adapter, "task-3");

    let dir = TempDir::new().unwrap();
    git2::Repository::init(dir.path()).unwrap();
    let validator = EvidenceValidator::open(dir.path(), EvidenceConfig::default()).unwrap();
    let engine = ReflectionEngine::new(adapter.clone(), validator, ReflectionMode::Permissive);

    let request = ReflectionRequest {
        task_id: "task-3".to_string(),
        outcome: RequestOutcome::Partial,
        claims: ReflectionClaims {
            trust_updates: vec![TrustUpdateClaim {
                pattern_id: "TEST:GHOST".to_string(),
                outcome: Some(apex_core::trust::Outcome::PartialSuccess),
                delta: None,
                evidence: Vec::new(),
            }],
            ..Default::default()
        },
        options: Default::default(),
    };

    let report = engine.reflect(request).unwrap();
    assert!(report.applied_updates.is_empty());
    assert_eq!(report.warnings.len(), 1);
}

#[test]
fn duplicate_trust_update_is_rejected() {
    let adapter = Arc::new(RusqliteAdapter::open_in_memory().unwrap());
    adapter.with_connection(|conn| run_migrations(conn).map(|_| ())).unwrap();
    let repository = PatternRepository::new(adapter.clone());
    repository.upsert(sample_pattern("TEST:A")).unwrap();
    seed_task(&adapter, "task-4");

    let dir = TempDir::new().unwrap();
    git2::Repository::init(dir.path()).unwrap();
    let validator = EvidenceValidator::open(dir.path(), EvidenceConfig::default()).unwrap();
    let engine = ReflectionEngine::new(adapter, validator, ReflectionMode::Strict);

    let dup = TrustUpdateClaim {
        pattern_id: "TEST:A".to_string(),
        outcome: Some(apex_core::trust::Outcome::WorkedPerfectly),
        delta: None,
        evidence: Vec::new(),
    };
    let request = ReflectionRequest {
        task_id: "task-4".to_string(),
        outcome: RequestOutcome::Success,
        claims: ReflectionClaims {
            trust_updates: vec![dup.clone(), dup],
            ..Default::default()
        },
        options: Default::default(),
    };

    let err = engine.reflect(request).unwrap_err();
    assert!(matches!(err, ReflectionError::DuplicateTrustUpdate { .. }));
}

#[test]
fn explicit_delta_overrides_outcome() {
    let adapter = Arc::new(RusqliteAdapter::open_in_memory().unwrap());
    adapter.with_connection(|conn| run_migrations(conn).map(|_| ())).unwrap();
    let repository = PatternRepository::new(adapter.clone());
    repository.upsert(sample_pattern("TEST:A")).unwrap();
    seed_task(&adapter, "task-5");

    let dir = TempDir::new().unwrap();
    git2::Repository::init(dir.path()).unwrap();
    let validator = EvidenceValidator::open(dir.path(), EvidenceConfig::default()).unwrap();
    let engine = ReflectionEngine::new(adapter, validator, ReflectionMode::Strict);

    let request = ReflectionRequest {
        task_id: "task-5".to_string(),
        outcome: RequestOutcome::Success,
        claims: ReflectionClaims {
            trust_updates: vec![TrustUpdateClaim {
                pattern_id: "TEST:A".to_string(),
                outcome: Some(apex_core::trust::Outcome::FailedCompletely),
                delta: Some((2.0, 0.0)),
                evidence: Vec::new(),
            }],
            ..Default::default()
        },
        options: Default::default(),
    };

    let report = engine.reflect(request).unwrap();
    assert_eq!(report.applied_updates[0].alpha, 3.0);
    assert_eq!(report.applied_updates[0].beta, 1.0);
}
