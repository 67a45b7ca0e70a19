use std::sync::Arc;

use apex_core::config::PackConfig;
use apex_core::ids::PatternId;
use apex_core::pattern::{Facets, Pattern, PatternType, Provenance, Semantics, Snippet};
use apex_pack::PackBuilder;
use apex_ranker::{RankExplain, RankedPattern};
use apex_storage::adapter::RusqliteAdapter;
use apex_storage::migrations::run_migrations;
use apex_storage::PatternRepository;
use chrono::Utc;

fn sample_pattern(id: &str, pattern_type: PatternType, snippet_lines: usize) -> Pattern {
    let now = Utc::now();
    let content = (0..snippet_lines).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
    let snippet = Snippet {
        snippet_id: format!("{id}-snip"),
        label: "example".into(),
        language: "rust".into(),
        file: None,
        line_start: None,
        line_end: None,
        size_bytes: content.len(),
        content,
    };
    Pattern {
        id: PatternId::parse(id).unwrap(),
        schema_version: 1,
        pattern_version: 1,
        pattern_type,
        title: format!("Pattern {id}"),
        summary: "summary".into(),
        trust_score: 0.5,
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
        snippets: vec![snippet],
        half_life_days: None,
    }
}

fn ranked(id: &str, score: f64) -> RankedPattern {
    RankedPattern {
        pattern_id: id.to_string(),
        score,
        explain: RankExplain { sub_scores: Vec::new(), total: score },
    }
}

fn test_repo() -> Arc<PatternRepository> {
    let adapter = RusqliteAdapter::open_in_memory().unwrap();
    adapter.with_connection(|conn| run_migrations(conn).map(|_| ())).unwrap();
    Arc::new(PatternRepository::new(Arc::new(adapter)))
}

#[test]
fn policies_are_always_included_regardless_of_quota() {
    let repo = test_repo();
    for i in 0..3 {
        repo.upsert(sample_pattern(&format!("TEST:POLICY{i}"), PatternType::Policy, 10)).unwrap();
    }
    let ranked_list: Vec<RankedPattern> = (0..3).map(|i| ranked(&format!("TEST:POLICY{i}"), 50.0)).collect();

    let config = PackConfig { budget_bytes: 1_000_000, ..Default::default() };
    let builder = PackBuilder::new(&repo, config);
    let pack = builder.build("task", &ranked_list, false).unwrap();

    assert_eq!(pack.policies.len(), 3);
}

#[test]
fn anti_patterns_and_tests_are_capped_by_quota() {
    let repo = test_repo();
    for i in 0..3 {
        repo.upsert(sample_pattern(&format!("TEST:ANTI{i}"), PatternType::Anti, 10)).unwrap();
        repo.upsert(sample_pattern(&format!("TEST:TEST{i}"), PatternType::Test, 10)).unwrap();
    }
    let mut ranked_list: Vec<RankedPattern> = (0..3).map(|i| ranked(&format!("TEST:ANTI{i}"), 70.0 - i as f64)).collect();
    ranked_list.extend((0..3).map(|i| ranked(&format!("TEST:TEST{i}"), 60.0 - i as f64)));

    let config = PackConfig { budget_bytes: 1_000_000, antis_quota: 2, tests_quota: 2, ..Default::default() };
    let builder = PackBuilder::new(&repo, config);
    let pack = builder.build("task", &ranked_list, false).unwrap();

    assert_eq!(pack.anti_patterns.len(), 2);
    assert_eq!(pack.tests.len(), 2);
}

#[test]
fn duplicate_ids_are_deduplicated() {
    let repo = test_repo();
    repo.upsert(sample_pattern("TEST:DUP", PatternType::Codebase, 10)).unwrap();
    let ranked_list = vec![ranked("TEST:DUP", 90.0), ranked("TEST:DUP", 90.0)];

    let config = PackConfig { budget_bytes: 1_000_000, ..Default::default() };
    let builder = PackBuilder::new(&repo, config);
    let pack = builder.build("task", &ranked_list, false).unwrap();

    assert_eq!(pack.candidates.len(), 1);
}

#[test]
fn tight_budget_trims_the_largest_snippet_before_dropping_items() {
    let repo = test_repo();
    repo.upsert(sample_pattern("TEST:BIG", PatternType::Codebase, 200)).unwrap();
    let ranked_list = vec![ranked("TEST:BIG", 90.0)];

    let config = PackConfig { budget_bytes: 900, snippet_lines_min: 8, ..Default::default() };
    let builder = PackBuilder::new(&repo, config);
    let pack = builder.build("task", &ranked_list, false).unwrap();

    assert_eq!(pack.candidates.len(), 1);
    let trimmed_lines = pack.candidates[0].snippets[0].content.lines().count();
    assert!(trimmed_lines < 200, "expected snippet to be trimmed, got {trimmed_lines} lines");
    assert!(trimmed_lines >= 8);
}

#[test]
fn impossible_budget_drops_candidates_and_records_a_reason() {
    let repo = test_repo();
    repo.upsert(sample_pattern("TEST:A", PatternType::Codebase, 8)).unwrap();
    repo.upsert(sample_pattern("TEST:B", PatternType::Codebase, 8)).unwrap();
    let ranked_list = vec![ranked("TEST:A", 90.0), ranked("TEST:B", 50.0)];

    let config = PackConfig { budget_bytes: 10, snippet_lines_min: 8, ..Default::default() };
    let builder = PackBuilder::new(&repo, config);
    let pack = builder.build("task", &ranked_list, false).unwrap();

    assert!(pack.candidates.len() < 2);
    assert!(!pack.meta.reasons.is_empty());
}

#[test]
fn meta_reports_considered_and_included_counts() {
    let repo = test_repo();
    repo.upsert(sample_pattern("TEST:ONLY", PatternType::Codebase, 5)).unwrap();
    let ranked_list = vec![ranked("TEST:ONLY", 42.0)];

    let config = PackConfig { budget_bytes: 1_000_000, ..Default::default() };
    let builder = PackBuilder::new(&repo, config);
    let pack = builder.build("task", &ranked_list, false).unwrap();

    assert_eq!(pack.meta.total_ranked, 1);
    assert_eq!(pack.meta.considered, 1);
    assert_eq!(pack.meta.included, 1);
    assert!(pack.meta.bytes > 0);
    assert!(pack.meta.gzip_bytes.unwrap() > 0);
}
