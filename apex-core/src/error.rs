//! Core-level errors: identifier parsing, canonicalisation, trust math inputs.

/// Errors raised by `apex-core` itself (ID parsing, canonical JSON, trust math).
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid pattern id `{id}`: {reason}")]
    InvalidPatternId { id: String, reason: String },

    #[error("invalid pattern type: {0}")]
    InvalidPatternType(String),

    #[error("canonicalisation failed: {0}")]
    Canonicalisation(#[from] serde_json::Error),

    #[error("invalid trust parameters: alpha={alpha}, beta={beta} (both must be >= 1)")]
    InvalidTrustParams { alpha: f64, beta: f64 },

    #[error("invalid regex trigger `{pattern}`: {reason}")]
    InvalidTrigger { pattern: String, reason: String },
}

pub type CoreResult<T> = Result<T, CoreError>;
