//! Database adapter, migration runner, and pattern repository for APEX
//! (spec.md §4.1–§4.3).

pub mod adapter;
pub mod error;
pub mod migrations;
pub mod queries;
pub mod repository;

pub use adapter::{RusqliteAdapter, SqlAdapter};
pub use error::{StorageError, StorageResult};
pub use repository::PatternRepository;
