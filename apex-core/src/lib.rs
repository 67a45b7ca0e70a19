//! Shared types, identifiers, canonical JSON, trust math, and error
//! taxonomy used by every APEX component.

pub mod canonical;
pub mod config;
pub mod error;
pub mod ids;
pub mod pattern;
pub mod task;
pub mod trust;

pub use config::ApexConfig;
pub use error::{CoreError, CoreResult};
pub use ids::PatternId;
pub use pattern::{Pattern, PatternType, Provenance};
pub use task::{Task, TaskPhase, TaskStatus};
