//! The APEX facade (spec.md §6): the single entry point a caller opens
//! against a project-local database, orchestrating storage, evidence,
//! reflection, ranking, packing, and task lifecycle behind one API and one
//! error type.

pub mod error;
pub mod requests;
pub mod service;

pub use error::{ApexError, ApexResult, ErrorKind};
pub use service::ApexService;

pub use requests::{
    DiscoverRequest, DiscoverResponse, ExplainRequest, ExplainResponse, LookupRequest,
    LookupResponse, ReflectionReport, ReflectionRequest, TaskCheckpointRequest,
    TaskCompleteRequest, TaskCreateRequest, TaskResponse, TaskSimilarRequest, TaskSimilarResponse,
    TaskSimilarity, TaskUpdateRequest,
};
