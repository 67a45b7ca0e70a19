//! Reflection engine for APEX: validates a reflection request, applies
//! trust updates, creates new patterns, and records evidence (spec.md §4.5).

pub mod engine;
pub mod error;
pub mod request;

pub use engine::ReflectionEngine;
pub use error::{ReflectionError, ReflectionResult};
pub use request::{
    AppliedUpdate, NewPatternDraft, PatternUsage, ReflectionClaims, ReflectionOptions,
    ReflectionReport, ReflectionRequest, RequestOutcome, TrustUpdateClaim,
};
