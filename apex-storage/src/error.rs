//! Storage-layer errors (adapter, migrations, repository).

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("sqlite error: {message}")]
    Sqlite { message: String },

    #[error("migration v{version:03} failed: {reason}")]
    MigrationFailed { version: u32, reason: String },

    #[error("migration validation failed for v{version:03}")]
    MigrationValidationFailed { version: u32 },

    #[error("schema drift: schema_meta reports v{schema_meta_version}, migrations table reports v{migrations_version}")]
    SchemaDrift {
        schema_meta_version: u32,
        migrations_version: u32,
    },

    #[error("pattern not found: {id}")]
    PatternNotFound { id: String },

    #[error("task not found: {id}")]
    TaskNotFound { id: String },

    #[error("duplicate pattern detected")]
    DuplicatePattern { existing_id: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("core error: {0}")]
    Core(#[from] apex_core::CoreError),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        StorageError::Sqlite { message: e.to_string() }
    }
}
