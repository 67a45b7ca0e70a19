//! Evidence-level error taxonomy (spec.md §7).

#[derive(Debug, thiserror::Error)]
pub enum EvidenceError {
    #[error("malformed evidence: {0}")]
    MalformedEvidence(String),

    #[error("pr not found: #{number} in {repo}")]
    PrNotFound { number: u64, repo: String },

    #[error("pr repo `{repo}` is not in the configured allowlist")]
    PrRepoNotAllowed { repo: String },

    #[error("commit not found: {reference}")]
    CommitNotFound { reference: String },

    #[error("line range not found: {file}:{start}-{end} at {sha}")]
    LineRangeNotFound { file: String, sha: String, start: u32, end: u32 },

    #[error("ambiguous ref: {reference}")]
    AmbiguousRef { reference: String },

    #[error("timeout resolving evidence after {retries} retries")]
    Timeout { retries: u32 },

    #[error("transient io error: {0}")]
    TransientIo(String),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),
}

pub type EvidenceResult<T> = Result<T, EvidenceError>;
