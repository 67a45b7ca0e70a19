use std::fs;

use apex_core::config::EvidenceConfig;
use apex_evidence::{Evidence, EvidenceValidator};
use git2::{Repository, Signature};
use tempfile::TempDir;

fn init_repo_with_file(dir: &TempDir, path: &str, content: &str) -> (Repository, String) {
    let repo = Repository::init(dir.path()).expect("init repo");
    let file_path = dir.path().join(path);
    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&file_path, content).unwrap();

    let mut index = repo.index().unwrap();
    index.add_path(std::path::Path::new(path)).unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let sig = Signature::now("tester", "tester@example.com").unwrap();
    let oid = repo
        .commit(Some("HEAD"), &sig, &sig, "initial commit", &tree, &[])
        .unwrap();

    (repo, oid.to_string())
}

#[test]
fn validates_existing_commit_by_full_sha() {
    let dir = TempDir::new().unwrap();
    let (_repo, sha) = init_repo_with_file(&dir, "README.md", "hello\n");
    drop(_repo);

    let validator = EvidenceValidator::open(dir.path(), EvidenceConfig::default()).unwrap();
    let result = validator.validate(&Evidence::Commit { sha: sha.clone() }).unwrap();
    assert!(result.valid);
    assert_eq!(result.resolved_sha, Some(sha));
}

#[test]
fn rejects_unknown_commit() {
    let dir = TempDir::new().unwrap();
    let (_repo, _sha) = init_repo_with_file(&dir, "README.md", "hello\n");
    drop(_repo);

    let validator = EvidenceValidator::open(dir.path(), EvidenceConfig::default()).unwrap();
    let bad_sha = "f".repeat(40);
    let err = validator.validate(&Evidence::Commit { sha: bad_sha }).unwrap_err();
    assert!(matches!(err, apex_evidence::EvidenceError::CommitNotFound { .. }));
}

#[test]
fn rejects_malformed_commit_reference() {
    let dir = TempDir::new().unwrap();
    let (_repo, _sha) = init_repo_with_file(&dir, "README.md", "hello\n");
    drop(_repo);

    let validator = EvidenceValidator::open(dir.path(), EvidenceConfig::default()).unwrap();
    let err = validator
        .validate(&Evidence::Commit {
            sha: "main..feature".to_string(),
        })
        .unwrap_err();
    assert!(matches!(err, apex_evidence::EvidenceError::MalformedEvidence(_)));
}

#[test]
fn validates_git_lines_direct_hit() {
    let dir = TempDir::new().unwrap();
    let (_repo, sha) = init_repo_with_file(&dir, "src/lib.rs", "fn a() {}\nfn b() {}\nfn c() {}\n");
    drop(_repo);

    let validator = EvidenceValidator::open(dir.path(), EvidenceConfig::default()).unwrap();
    let result = validator
        .validate(&Evidence::GitLines {
            file: "src/lib.rs".to_string(),
            sha,
            start: 2,
            end: 2,
            snippet_hash: None,
        })
        .unwrap();
    assert!(result.valid);
    assert_eq!(result.resolved_start, Some(2));
    assert_eq!(result.resolved_end, Some(2));
}

#[test]
fn falls_back_when_requested_range_misses_but_snippet_hash_matches_elsewhere() {
    let dir = TempDir::new().unwrap();
    let (_repo, sha) = init_repo_with_file(&dir, "src/lib.rs", "fn a() {}\nfn b() {}\nfn c() {}\n");
    drop(_repo);

    let target_hash = apex_evidence::normalize::hash_normalized("fn c() {}");

    let validator = EvidenceValidator::open(dir.path(), EvidenceConfig::default()).unwrap();
    let result = validator
        .validate(&Evidence::GitLines {
            file: "src/lib.rs".to_string(),
            sha,
            start: 1,
            end: 1,
            snippet_hash: Some(target_hash),
        })
        .unwrap();
    assert!(result.valid);
    assert_eq!(result.resolved_start, Some(3));
    assert_eq!(result.confidence, 1.0);
}

#[test]
fn pr_rejected_when_repo_not_allowlisted() {
    let dir = TempDir::new().unwrap();
    let (_repo, _sha) = init_repo_with_file(&dir, "README.md", "hello\n");
    drop(_repo);

    let validator = EvidenceValidator::open(dir.path(), EvidenceConfig { pr_allowlist: vec!["org/allowed".to_string()], ..Default::default() }).unwrap();
    let err = validator
        .validate(&Evidence::Pr {
            number: 42,
            repo: "org/other".to_string(),
        })
        .unwrap_err();
    assert!(matches!(err, apex_evidence::EvidenceError::PrRepoNotAllowed { .. }));
}
