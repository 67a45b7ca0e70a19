//! Evidence validation pipeline (spec.md §4.4).
//!
//! Each `Evidence` kind is validated against a local git repository opened
//! via `git2`. Validation never makes a network call: PR evidence is
//! checked against a configured repo allowlist and, if the corresponding
//! `refs/pull/<n>/head` ref exists locally, that ref is used to confirm the
//! PR was fetched at some point.

use std::collections::HashSet;
use std::path::Path;
use std::time::{Duration, Instant};

use git2::{ErrorCode, Repository};
use tracing::{debug, warn};

use apex_core::config::EvidenceConfig;

use crate::cache::ValidationCache;
use crate::error::{EvidenceError, EvidenceResult};
use crate::evidence::{Evidence, ValidationResult};
use crate::normalize::{extract_lines, hash_normalized};

const MAX_REF_LEN: usize = 255;

pub struct EvidenceValidator {
    repo: Repository,
    allowed_pr_repos: HashSet<String>,
    cache: ValidationCache,
    timeout_ms: u64,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl EvidenceValidator {
    pub fn open(repo_path: impl AsRef<Path>, config: EvidenceConfig) -> EvidenceResult<Self> {
        let repo = Repository::open(repo_path.as_ref())?;
        Ok(Self {
            repo,
            allowed_pr_repos: config.pr_allowlist.into_iter().collect(),
            cache: ValidationCache::new(10_000, Duration::from_secs(config.cache_ttl_secs)),
            timeout_ms: config.timeout_ms,
            max_retries: config.max_retries,
            backoff_base_ms: config.backoff_base_ms,
        })
    }

    pub fn validate(&self, evidence: &Evidence) -> EvidenceResult<ValidationResult> {
        let fingerprint = evidence.fingerprint();
        if let Some(cached) = self.cache.get(&fingerprint) {
            debug!(%fingerprint, "evidence validation cache hit");
            return Ok(cached);
        }

        let result = self.with_retry(|| match evidence {
            Evidence::Commit { sha } => self.validate_commit(sha),
            Evidence::Pr { number, repo } => self.validate_pr(*number, repo),
            Evidence::GitLines {
                file,
                sha,
                start,
                end,
                snippet_hash,
            } => self.validate_git_lines(file, sha, *start, *end, snippet_hash.as_deref()),
        })?;

        self.cache.insert(fingerprint, result.clone());
        Ok(result)
    }

    /// Retry transient git failures with exponential backoff, bounded by
    /// `timeout_ms` (spec.md:171). Logical failures (not found, ambiguous,
    /// malformed) are never retried; exhausting the retry/time budget on a
    /// transient error surfaces `Timeout` rather than the last raw error.
    fn with_retry<F>(&self, attempt_fn: F) -> EvidenceResult<ValidationResult>
    where
        F: Fn() -> EvidenceResult<ValidationResult>,
    {
        let deadline = Instant::now() + Duration::from_millis(self.timeout_ms);
        let mut attempt = 0u32;
        loop {
            match attempt_fn() {
                Ok(result) => return Ok(result),
                Err(e) if is_transient(&e) => {
                    if attempt >= self.max_retries || Instant::now() >= deadline {
                        return Err(EvidenceError::Timeout { retries: attempt });
                    }
                    let backoff = Duration::from_millis(self.backoff_base_ms.saturating_mul(1u64 << attempt));
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    warn!(attempt, backoff_ms = backoff.as_millis() as u64, "retrying transient evidence error");
                    std::thread::sleep(backoff.min(remaining));
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn validate_commit(&self, sha: &str) -> EvidenceResult<ValidationResult> {
        reject_malformed_ref(sha)?;

        if is_full_hex_sha(sha) {
            let oid = git2::Oid::from_str(sha).map_err(|_| EvidenceError::CommitNotFound {
                reference: sha.to_string(),
            })?;
            return match self.repo.find_commit(oid) {
                Ok(commit) => Ok(ValidationResult {
                    resolved_sha: Some(commit.id().to_string()),
                    ..ValidationResult::ok(1.0)
                }),
                Err(e) if e.code() == ErrorCode::NotFound => Err(EvidenceError::CommitNotFound {
                    reference: sha.to_string(),
                }),
                Err(e) => Err(e.into()),
            };
        }

        match self.repo.revparse_single(sha) {
            Ok(obj) => {
                let commit = obj.peel_to_commit()?;
                Ok(ValidationResult {
                    resolved_sha: Some(commit.id().to_string()),
                    ..ValidationResult::ok(1.0)
                })
            }
            Err(e) if e.code() == ErrorCode::Ambiguous => Err(EvidenceError::AmbiguousRef {
                reference: sha.to_string(),
            }),
            Err(e) if e.code() == ErrorCode::NotFound => Err(EvidenceError::CommitNotFound {
                reference: sha.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn validate_pr(&self, number: u64, repo: &str) -> EvidenceResult<ValidationResult> {
        if !self.allowed_pr_repos.contains(repo) {
            return Err(EvidenceError::PrRepoNotAllowed {
                repo: repo.to_string(),
            });
        }

        let ref_name = format!("refs/pull/{number}/head");
        match self.repo.find_reference(&ref_name) {
            Ok(_) => Ok(ValidationResult::ok(1.0)),
            Err(e) if e.code() == ErrorCode::NotFound => Err(EvidenceError::PrNotFound {
                number,
                repo: repo.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn validate_git_lines(
        &self,
        file: &str,
        sha: &str,
        start: u32,
        end: u32,
        snippet_hash: Option<&str>,
    ) -> EvidenceResult<ValidationResult> {
        reject_malformed_ref(sha)?;

        let commit = self
            .repo
            .revparse_single(sha)
            .and_then(|obj| obj.peel_to_commit())
            .map_err(|_| EvidenceError::CommitNotFound {
                reference: sha.to_string(),
            })?;

        let tree = commit.tree()?;

        if let Ok(entry) = tree.get_path(Path::new(file)) {
            let blob = entry.to_object(&self.repo)?.peel_to_blob()?;
            let content = std::str::from_utf8(blob.content()).unwrap_or("");
            if let Some(snippet) = extract_lines(content, start, end) {
                let computed = hash_normalized(&snippet);
                let hash_matches = match snippet_hash {
                    Some(expected) => expected == computed,
                    None => true,
                };
                if hash_matches {
                    return Ok(ValidationResult {
                        resolved_start: Some(start),
                        resolved_end: Some(end),
                        resolved_sha: Some(commit.id().to_string()),
                        ..ValidationResult::ok(1.0)
                    });
                }
                warn!(%file, %sha, "line range present but snippet hash mismatch, falling back");
            }
        }

        self.fallback_scan(file, &commit, snippet_hash, sha)
    }

    /// Stage 2: scan the file's full contents at `commit` for a normalised
    /// run of lines whose hash matches `snippet_hash`. Confidence reflects
    /// whether the match was unique.
    fn fallback_scan(
        &self,
        file: &str,
        commit: &git2::Commit<'_>,
        snippet_hash: Option<&str>,
        sha: &str,
    ) -> EvidenceResult<ValidationResult> {
        let Some(expected) = snippet_hash else {
            return Err(EvidenceError::LineRangeNotFound {
                file: file.to_string(),
                sha: sha.to_string(),
                start: 0,
                end: 0,
            });
        };

        let tree = commit.tree()?;
        let entry = tree.get_path(Path::new(file)).map_err(|_| EvidenceError::LineRangeNotFound {
            file: file.to_string(),
            sha: sha.to_string(),
            start: 0,
            end: 0,
        })?;
        let blob = entry.to_object(&self.repo)?.peel_to_blob()?;
        let content = std::str::from_utf8(blob.content()).unwrap_or("");
        let lines: Vec<&str> = content.lines().collect();

        let mut matches = Vec::new();
        for window in 1..=lines.len() {
            // bound the search to avoid pathological O(n^2) on huge files
            if window > 200 {
                break;
            }
            for start_idx in 0..=lines.len().saturating_sub(window) {
                let candidate = lines[start_idx..start_idx + window].join("\n");
                if hash_normalized(&candidate) == expected {
                    matches.push((start_idx as u32 + 1, (start_idx + window) as u32));
                }
            }
            if !matches.is_empty() {
                break;
            }
        }

        match matches.len() {
            0 => Err(EvidenceError::LineRangeNotFound {
                file: file.to_string(),
                sha: sha.to_string(),
                start: 0,
                end: 0,
            }),
            1 => {
                let (s, e) = matches[0];
                Ok(ValidationResult {
                    resolved_start: Some(s),
                    resolved_end: Some(e),
                    resolved_sha: Some(commit.id().to_string()),
                    ..ValidationResult::ok(1.0)
                })
            }
            _ => {
                let (s, e) = matches[0];
                Ok(ValidationResult {
                    resolved_start: Some(s),
                    resolved_end: Some(e),
                    resolved_sha: Some(commit.id().to_string()),
                    ..ValidationResult::ok(0.5)
                })
            }
        }
    }
}

/// Only transport/resource failures are retried — a definitive "this ref
/// doesn't exist" answer is never transient.
fn is_transient(e: &EvidenceError) -> bool {
    matches!(e, EvidenceError::Git(_) | EvidenceError::TransientIo(_))
}

fn is_full_hex_sha(s: &str) -> bool {
    s.len() == 40 && s.bytes().all(|b| b.is_ascii_digit() || (b.is_ascii_lowercase() && b.is_ascii_hexdigit()))
}

fn reject_malformed_ref(reference: &str) -> EvidenceResult<()> {
    if reference.is_empty()
        || reference.len() > MAX_REF_LEN
        || reference.contains("..")
        || reference.starts_with('/')
        || reference.contains(char::is_whitespace)
        || reference.contains('|')
    {
        return Err(EvidenceError::MalformedEvidence(format!(
            "invalid git reference: {reference}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_dotdot_refs() {
        assert!(reject_malformed_ref("main..feature").is_err());
    }

    #[test]
    fn rejects_leading_slash() {
        assert!(reject_malformed_ref("/etc/passwd").is_err());
    }

    #[test]
    fn rejects_whitespace_and_pipes() {
        assert!(reject_malformed_ref("main; rm -rf").is_err());
        assert!(reject_malformed_ref("main|cat").is_err());
    }

    #[test]
    fn rejects_overlong_refs() {
        let long = "a".repeat(300);
        assert!(reject_malformed_ref(&long).is_err());
    }

    #[test]
    fn accepts_ordinary_branch_names() {
        assert!(reject_malformed_ref("main").is_ok());
        assert!(reject_malformed_ref("release/1.2.0").is_ok());
    }

    #[test]
    fn full_hex_sha_detection() {
        assert!(is_full_hex_sha(&"a".repeat(40)));
        assert!(!is_full_hex_sha(&"A".repeat(40)));
        assert!(!is_full_hex_sha("deadbeef"));
    }
}
