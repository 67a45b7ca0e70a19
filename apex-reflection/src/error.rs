//! Reflection engine error taxonomy (spec.md §4.5, §7).

#[derive(Debug, thiserror::Error)]
pub enum ReflectionError {
    #[error("unknown pattern id: {id}")]
    UnknownPatternId { id: String },

    #[error("duplicate trust update for pattern: {id}")]
    DuplicateTrustUpdate { id: String },

    #[error("trust update for `{id}` carries neither an outcome nor an explicit delta")]
    MissingOutcomeOrDelta { id: String },

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

    #[error("evidence validation timed out after {retries} retries")]
    EvidenceTimeout { retries: u32 },

    #[error("transient evidence io error: {0}")]
    EvidenceTransientIo(String),

    #[error("storage error: {0}")]
    Storage(#[from] apex_storage::StorageError),

    #[error("core error: {0}")]
    Core(#[from] apex_core::CoreError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ReflectionResult<T> = Result<T, ReflectionError>;

impl From<apex_evidence::EvidenceError> for ReflectionError {
    fn from(e: apex_evidence::EvidenceError) -> Self {
        use apex_evidence::EvidenceError as E;
        match e {
            E::MalformedEvidence(msg) => ReflectionError::MalformedEvidence(msg),
            E::PrNotFound { number, repo } => ReflectionError::PrNotFound { number, repo },
            E::PrRepoNotAllowed { repo } => ReflectionError::PrRepoNotAllowed { repo },
            E::CommitNotFound { reference } => ReflectionError::CommitNotFound { reference },
            E::LineRangeNotFound { file, sha, start, end } => {
                ReflectionError::LineRangeNotFound { file, sha, start, end }
            }
            E::AmbiguousRef { reference } => ReflectionError::AmbiguousRef { reference },
            E::Timeout { retries } => ReflectionError::EvidenceTimeout { retries },
            E::TransientIo(msg) => ReflectionError::EvidenceTransientIo(msg),
            E::Git(err) => ReflectionError::EvidenceTransientIo(err.to_string()),
        }
    }
}
