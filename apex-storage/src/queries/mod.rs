//! Query helpers backing `PatternRepository`, split by concern the way the
//! teacher splits `cortex-storage::queries` into one file per operation
//! group.

pub mod alias;
pub mod facets;
pub mod fts;
pub mod pattern_crud;
pub mod reflection_log;
pub mod task_crud;
