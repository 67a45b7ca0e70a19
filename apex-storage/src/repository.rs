//! `PatternRepository`: the public contract of spec.md §4.3.

use std::sync::Arc;

use rusqlite::OptionalExtension;

use apex_core::canonical::canonicalise_and_digest;
use apex_core::ids::PatternId;
use apex_core::pattern::{Pattern, PatternType, Provenance};

use crate::adapter::SqlAdapter;
use crate::error::{StorageError, StorageResult};
use crate::queries::{alias, pattern_crud};

pub struct PatternRepository {
    adapter: Arc<dyn SqlAdapter>,
}

impl PatternRepository {
    pub fn new(adapter: Arc<dyn SqlAdapter>) -> Self {
        Self { adapter }
    }

    /// Resolve by ID first, then alias. Never returns an invalidated
    /// pattern unless `include_invalid` is set.
    pub fn get(&self, id_or_alias: &str, include_invalid: bool) -> StorageResult<Option<Pattern>> {
        self.adapter
            .with_connection(|conn| pattern_crud::get(conn, id_or_alias, include_invalid))
    }

    pub fn list_by_type(&self, pattern_type: PatternType) -> StorageResult<Vec<Pattern>> {
        self.adapter
            .with_connection(|conn| pattern_crud::list_by_type(conn, pattern_type))
    }

    /// Every non-invalidated pattern, for the ranker's candidate scan
    /// (spec.md §4.6).
    pub fn list_all(&self) -> StorageResult<Vec<Pattern>> {
        self.adapter.with_connection(pattern_crud::list_all)
    }

    /// bm25-ordered full-text search, excluding invalidated patterns.
    pub fn search(&self, query: &str, limit: usize) -> StorageResult<Vec<PatternId>> {
        self.adapter.with_connection(|conn| {
            let ids = crate::queries::fts::search(conn, query, limit)?;
            ids.into_iter()
                .map(|s| PatternId::parse(&s).map_err(StorageError::from))
                .collect()
        })
    }

    /// Insert or update a pattern. Canonicalises JSON, computes the
    /// digest, and maintains facets + FTS inside one transaction.
    ///
    /// If `pattern.id` was auto-allocated (no caller-supplied ID) and a
    /// digest-identical pattern already exists, the existing ID is
    /// returned and the incoming write is discarded (first-write-wins for
    /// auto-IDs; idempotent for provided IDs, per spec.md §4.3).
    pub fn upsert(&self, mut pattern: Pattern) -> StorageResult<Pattern> {
        let (canonical_bytes, digest) = canonicalise_and_digest(&DigestView::from(&pattern))?;
        pattern.pattern_digest = Some(digest.clone());

        self.adapter.transaction(|conn| {
            if pattern.provenance == Provenance::AutoCreated {
                if let Some(existing_id) =
                    find_by_digest(conn, &digest, pattern.id.as_str())?
                {
                    return Err(StorageError::DuplicatePattern { existing_id });
                }
            }
            pattern_crud::upsert(conn, &pattern, &canonical_bytes, &digest)?;
            Ok(())
        })?;

        Ok(pattern)
    }

    /// Cascades to facets/snippets/FTS; never touches evidence/reflection logs.
    pub fn delete(&self, id: &str) -> StorageResult<()> {
        self.adapter.transaction(|conn| pattern_crud::delete(conn, id))
    }

    /// Slug from `title`, lowercased, collision-safe.
    pub fn assign_alias(&self, id: &str, title: &str) -> StorageResult<String> {
        self.adapter
            .transaction(|conn| alias::assign_alias(conn, id, title))
    }
}

/// Digest view of a pattern: everything except the digest field itself
/// (hashing a struct that contains its own hash would be circular).
#[derive(serde::Serialize)]
struct DigestView<'a> {
    id: &'a str,
    schema_version: u32,
    pattern_version: u32,
    pattern_type: &'a apex_core::pattern::PatternType,
    title: &'a str,
    summary: &'a str,
    trust_score: f64,
    alpha: f64,
    beta: f64,
    usage_count: u64,
    success_count: u64,
    alias: &'a Option<String>,
    provenance: &'a Provenance,
    invalid: bool,
    invalid_reason: &'a Option<String>,
    facets: &'a apex_core::pattern::Facets,
    semantics: &'a apex_core::pattern::Semantics,
    snippets: &'a Vec<apex_core::pattern::Snippet>,
}

impl<'a> From<&'a Pattern> for DigestView<'a> {
    fn from(p: &'a Pattern) -> Self {
        Self {
            id: p.id.as_str(),
            schema_version: p.schema_version,
            pattern_version: p.pattern_version,
            pattern_type: &p.pattern_type,
            title: &p.title,
            summary: &p.summary,
            trust_score: p.trust_score,
            alpha: p.alpha,
            beta: p.beta,
            usage_count: p.usage_count,
            success_count: p.success_count,
            alias: &p.alias,
            provenance: &p.provenance,
            invalid: p.invalid,
            invalid_reason: &p.invalid_reason,
            facets: &p.facets,
            semantics: &p.semantics,
            snippets: &p.snippets,
        }
    }
}

fn find_by_digest(
    conn: &rusqlite::Connection,
    digest: &str,
    exclude_id: &str,
) -> StorageResult<Option<String>> {
    let id: Option<String> = conn
        .query_row(
            "SELECT id FROM patterns WHERE pattern_digest = ?1 AND id != ?2",
            rusqlite::params![digest, exclude_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}
