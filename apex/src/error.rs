//! The facade error type (spec.md §7): one enum callers match on, tagged
//! with the taxonomy's `kind` so propagation policy is mechanical.

#[derive(Debug, thiserror::Error)]
pub enum ApexError {
    #[error("storage error: {0}")]
    Storage(#[from] apex_storage::StorageError),

    #[error("evidence error: {0}")]
    Evidence(#[from] apex_evidence::EvidenceError),

    #[error("reflection error: {0}")]
    Reflection(#[from] apex_reflection::ReflectionError),

    #[error("ranker error: {0}")]
    Ranker(#[from] apex_ranker::RankerError),

    #[error("pack error: {0}")]
    Pack(#[from] apex_pack::PackError),

    #[error("task error: {0}")]
    Task(#[from] apex_tasks::TaskError),

    #[error("core error: {0}")]
    Core(#[from] apex_core::CoreError),
}

pub type ApexResult<T> = Result<T, ApexError>;

/// The §7 error taxonomy, flattened across every subsystem so a caller can
/// switch on `error.kind()` instead of matching each subsystem's enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    SchemaInvalid,
    PatternNotFound,
    DuplicateTrustUpdate,
    MalformedEvidence,
    PrNotFound,
    CommitNotFound,
    LineRangeNotFound,
    AmbiguousRef,
    TransientIo,
    Timeout,
    MigrationFailed,
    Internal,
}

impl ApexError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApexError::Storage(e) => storage_kind(e),
            ApexError::Evidence(e) => evidence_kind(e),
            ApexError::Reflection(e) => reflection_kind(e),
            ApexError::Ranker(apex_ranker::RankerError::Storage(e)) => storage_kind(e),
            ApexError::Pack(e) => match e {
                apex_pack::PackError::Storage(e) => storage_kind(e),
                apex_pack::PackError::Ranker(apex_ranker::RankerError::Storage(e)) => storage_kind(e),
                apex_pack::PackError::Json(_) => ErrorKind::Internal,
            },
            ApexError::Task(e) => task_kind(e),
            ApexError::Core(_) => ErrorKind::Internal,
        }
    }
}

fn storage_kind(e: &apex_storage::StorageError) -> ErrorKind {
    use apex_storage::StorageError as St;
    match e {
        St::MigrationFailed { .. } | St::MigrationValidationFailed { .. } | St::SchemaDrift { .. } => {
            ErrorKind::MigrationFailed
        }
        St::PatternNotFound { .. } | St::TaskNotFound { .. } => ErrorKind::PatternNotFound,
        St::DuplicatePattern { .. } => ErrorKind::DuplicateTrustUpdate,
        St::Sqlite { .. } => ErrorKind::TransientIo,
        St::Json(_) | St::Core(_) => ErrorKind::Internal,
    }
}

fn evidence_kind(e: &apex_evidence::EvidenceError) -> ErrorKind {
    use apex_evidence::EvidenceError as Ev;
    match e {
        Ev::MalformedEvidence(_) => ErrorKind::MalformedEvidence,
        Ev::PrNotFound { .. } => ErrorKind::PrNotFound,
        Ev::PrRepoNotAllowed { .. } => ErrorKind::MalformedEvidence,
        Ev::CommitNotFound { .. } => ErrorKind::CommitNotFound,
        Ev::LineRangeNotFound { .. } => ErrorKind::LineRangeNotFound,
        Ev::AmbiguousRef { .. } => ErrorKind::AmbiguousRef,
        Ev::Timeout { .. } => ErrorKind::Timeout,
        Ev::TransientIo(_) | Ev::Git(_) => ErrorKind::TransientIo,
    }
}

fn reflection_kind(e: &apex_reflection::ReflectionError) -> ErrorKind {
    use apex_reflection::ReflectionError as Re;
    match e {
        Re::UnknownPatternId { .. } => ErrorKind::PatternNotFound,
        Re::DuplicateTrustUpdate { .. } => ErrorKind::DuplicateTrustUpdate,
        Re::MissingOutcomeOrDelta { .. } => ErrorKind::SchemaInvalid,
        Re::MalformedEvidence(_) => ErrorKind::MalformedEvidence,
        Re::PrNotFound { .. } => ErrorKind::PrNotFound,
        Re::PrRepoNotAllowed { .. } => ErrorKind::MalformedEvidence,
        Re::CommitNotFound { .. } => ErrorKind::CommitNotFound,
        Re::LineRangeNotFound { .. } => ErrorKind::LineRangeNotFound,
        Re::AmbiguousRef { .. } => ErrorKind::AmbiguousRef,
        Re::EvidenceTimeout { .. } => ErrorKind::Timeout,
        Re::EvidenceTransientIo(_) => ErrorKind::TransientIo,
        Re::Storage(inner) => storage_kind(inner),
        Re::Core(_) | Re::Json(_) => ErrorKind::Internal,
    }
}

fn task_kind(e: &apex_tasks::TaskError) -> ErrorKind {
    use apex_tasks::TaskError as Ta;
    match e {
        Ta::TaskNotFound { .. } => ErrorKind::PatternNotFound,
        Ta::InvalidPhaseTransition { .. } => ErrorKind::SchemaInvalid,
        Ta::AlreadyCompleted { .. } => ErrorKind::SchemaInvalid,
        Ta::Storage(inner) => storage_kind(inner),
        Ta::Json(_) => ErrorKind::Internal,
    }
}
