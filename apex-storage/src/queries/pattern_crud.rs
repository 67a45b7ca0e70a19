//! Pattern row mapping and CRUD (spec.md §4.3).

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use apex_core::ids::PatternId;
use apex_core::pattern::{Pattern, PatternType, Provenance};

use crate::error::{StorageError, StorageResult};
use crate::queries::facets;

pub fn get_by_id(conn: &Connection, id: &str, include_invalid: bool) -> StorageResult<Option<Pattern>> {
    let row = conn
        .query_row(
            "SELECT id, schema_version, pattern_version, type, title, summary, trust_score,
                    alpha, beta, usage_count, success_count, created_at, updated_at, alias,
                    provenance, invalid, invalid_reason, pattern_digest, half_life_days,
                    key_insight, when_to_use, common_pitfalls, keywords, search_index
             FROM patterns WHERE id = ?1",
            params![id],
            row_to_pattern,
        )
        .optional()?;

    match row {
        Some(mut pattern) => {
            if pattern.invalid && !include_invalid {
                return Ok(None);
            }
            pattern.facets = facets::load_facets(conn, id)?;
            pattern.semantics.triggers = facets::load_triggers_pub(conn, id)?;
            pattern.semantics.vocabulary = facets::load_vocab_pub(conn, id)?;
            pattern.snippets = load_snippets(conn, id)?;
            Ok(Some(pattern))
        }
        None => Ok(None),
    }
}

pub fn get_by_alias(conn: &Connection, alias: &str, include_invalid: bool) -> StorageResult<Option<Pattern>> {
    let id: Option<String> = conn
        .query_row(
            "SELECT id FROM patterns WHERE alias = ?1",
            params![alias],
            |row| row.get(0),
        )
        .optional()?;

    match id {
        Some(id) => get_by_id(conn, &id, include_invalid),
        None => Ok(None),
    }
}

/// Resolve by ID first, then alias, per spec.md §4.3.
pub fn get(conn: &Connection, id_or_alias: &str, include_invalid: bool) -> StorageResult<Option<Pattern>> {
    if let Some(p) = get_by_id(conn, id_or_alias, include_invalid)? {
        return Ok(Some(p));
    }
    get_by_alias(conn, id_or_alias, include_invalid)
}

/// All non-invalidated patterns, for the ranker's candidate generation
/// (spec.md §4.6), which needs to scan across every type rather than one.
pub fn list_all(conn: &Connection) -> StorageResult<Vec<Pattern>> {
    let mut stmt = conn.prepare(
        "SELECT id, schema_version, pattern_version, type, title, summary, trust_score,
                alpha, beta, usage_count, success_count, created_at, updated_at, alias,
                provenance, invalid, invalid_reason, pattern_digest, half_life_days,
                key_insight, when_to_use, common_pitfalls, keywords, search_index
         FROM patterns WHERE invalid = 0",
    )?;
    let rows = stmt.query_map([], row_to_pattern)?;
    let mut out = Vec::new();
    for r in rows {
        let mut pattern = r?;
        pattern.facets = facets::load_facets(conn, pattern.id.as_str())?;
        pattern.semantics.triggers = facets::load_triggers_pub(conn, pattern.id.as_str())?;
        pattern.semantics.vocabulary = facets::load_vocab_pub(conn, pattern.id.as_str())?;
        pattern.snippets = load_snippets(conn, pattern.id.as_str())?;
        out.push(pattern);
    }
    Ok(out)
}

pub fn list_by_type(conn: &Connection, pattern_type: PatternType) -> StorageResult<Vec<Pattern>> {
    let type_str = pattern_type_str(pattern_type);
    let mut stmt = conn.prepare(
        "SELECT id, schema_version, pattern_version, type, title, summary, trust_score,
                alpha, beta, usage_count, success_count, created_at, updated_at, alias,
                provenance, invalid, invalid_reason, pattern_digest, half_life_days,
                key_insight, when_to_use, common_pitfalls, keywords, search_index
         FROM patterns WHERE type = ?1 AND invalid = 0",
    )?;
    let rows = stmt.query_map(params![type_str], row_to_pattern)?;
    let mut out = Vec::new();
    for r in rows {
        let mut pattern = r?;
        pattern.facets = facets::load_facets(conn, pattern.id.as_str())?;
        pattern.semantics.triggers = facets::load_triggers_pub(conn, pattern.id.as_str())?;
        pattern.semantics.vocabulary = facets::load_vocab_pub(conn, pattern.id.as_str())?;
        pattern.snippets = load_snippets(conn, pattern.id.as_str())?;
        out.push(pattern);
    }
    Ok(out)
}

/// Insert or update a pattern row, its facets, semantics, and snippets, and
/// keep `patterns_fts` in sync — all within the caller's transaction.
/// `canonical` is the caller-computed `(bytes, digest)` pair so the
/// repository never has to re-derive canonicalisation policy.
pub fn upsert(
    conn: &Connection,
    pattern: &Pattern,
    canonical_bytes: &[u8],
    digest: &str,
) -> StorageResult<()> {
    let common_pitfalls_json = serde_json::to_string(&pattern.semantics.common_pitfalls)?;
    let keywords_json = serde_json::to_string(&pattern.semantics.keywords)?;

    conn.execute(
        "INSERT INTO patterns (
            id, schema_version, pattern_version, type, title, summary, trust_score,
            alpha, beta, usage_count, success_count, created_at, updated_at, alias,
            provenance, invalid, invalid_reason, pattern_digest, json_canonical,
            half_life_days, key_insight, when_to_use, common_pitfalls, keywords, search_index
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18,
            ?19, ?20, ?21, ?22, ?23, ?24, ?25
        )
        ON CONFLICT(id) DO UPDATE SET
            schema_version = excluded.schema_version,
            pattern_version = excluded.pattern_version,
            type = excluded.type,
            title = excluded.title,
            summary = excluded.summary,
            trust_score = excluded.trust_score,
            alpha = excluded.alpha,
            beta = excluded.beta,
            usage_count = excluded.usage_count,
            success_count = excluded.success_count,
            updated_at = excluded.updated_at,
            alias = excluded.alias,
            provenance = excluded.provenance,
            invalid = excluded.invalid,
            invalid_reason = excluded.invalid_reason,
            pattern_digest = excluded.pattern_digest,
            json_canonical = excluded.json_canonical,
            half_life_days = excluded.half_life_days,
            key_insight = excluded.key_insight,
            when_to_use = excluded.when_to_use,
            common_pitfalls = excluded.common_pitfalls,
            keywords = excluded.keywords,
            search_index = excluded.search_index",
        params![
            pattern.id.as_str(),
            pattern.schema_version,
            pattern.pattern_version,
            pattern_type_str(pattern.pattern_type),
            pattern.title,
            pattern.summary,
            pattern.trust_score,
            pattern.alpha,
            pattern.beta,
            pattern.usage_count,
            pattern.success_count,
            pattern.created_at.to_rfc3339(),
            pattern.updated_at.to_rfc3339(),
            pattern.alias,
            provenance_str(pattern.provenance),
            pattern.invalid as i32,
            pattern.invalid_reason,
            digest,
            canonical_bytes,
            pattern.half_life_days,
            pattern.semantics.key_insight,
            pattern.semantics.when_to_use,
            common_pitfalls_json,
            keywords_json,
            pattern.semantics.search_index,
        ],
    )?;

    facets::replace_facets(conn, pattern.id.as_str(), &pattern.facets)?;
    facets::replace_semantics(conn, pattern.id.as_str(), &pattern.semantics)?;
    replace_snippets(conn, pattern.id.as_str(), &pattern.snippets)?;

    let tags_joined = pattern.facets.tags.join(" ");
    crate::queries::fts::sync_fts_row(
        conn,
        pattern.id.as_str(),
        &pattern.title,
        &pattern.summary,
        &tags_joined,
        &pattern.semantics.keywords.join(" "),
        pattern.semantics.search_index.as_deref().unwrap_or(""),
        pattern.invalid,
    )?;

    Ok(())
}

/// Delete a pattern and cascade to facets/snippets/FTS/metadata. Does NOT
/// touch `pattern_evidence`/`reflections` (spec.md §4.3).
pub fn delete(conn: &Connection, id: &str) -> StorageResult<()> {
    let existed: bool = conn
        .query_row("SELECT 1 FROM patterns WHERE id = ?1", params![id], |_| Ok(true))
        .optional()?
        .unwrap_or(false);
    if !existed {
        return Err(StorageError::PatternNotFound { id: id.to_string() });
    }
    crate::queries::fts::remove_fts_row(conn, id)?;
    conn.execute("DELETE FROM patterns WHERE id = ?1", params![id])?;
    Ok(())
}

fn replace_snippets(conn: &Connection, pattern_id: &str, snippets: &[apex_core::pattern::Snippet]) -> StorageResult<()> {
    conn.execute("DELETE FROM snippets WHERE pattern_id = ?1", params![pattern_id])?;
    for snippet in snippets {
        conn.execute(
            "INSERT INTO snippets (snippet_id, pattern_id, label, language, file, line_start,
                line_end, content, size_bytes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                snippet.snippet_id,
                pattern_id,
                snippet.label,
                snippet.language,
                snippet.file,
                snippet.line_start,
                snippet.line_end,
                snippet.content,
                snippet.size_bytes as i64,
            ],
        )?;
    }
    Ok(())
}

fn load_snippets(conn: &Connection, pattern_id: &str) -> StorageResult<Vec<apex_core::pattern::Snippet>> {
    let mut stmt = conn.prepare(
        "SELECT snippet_id, label, language, file, line_start, line_end, content, size_bytes
         FROM snippets WHERE pattern_id = ?1",
    )?;
    let rows = stmt.query_map(params![pattern_id], |row| {
        Ok(apex_core::pattern::Snippet {
            snippet_id: row.get(0)?,
            label: row.get(1)?,
            language: row.get(2)?,
            file: row.get(3)?,
            line_start: row.get(4)?,
            line_end: row.get(5)?,
            content: row.get(6)?,
            size_bytes: row.get::<_, i64>(7)? as usize,
        })
    })?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

fn row_to_pattern(row: &rusqlite::Row) -> rusqlite::Result<Pattern> {
    let id_str: String = row.get(0)?;
    let type_str: String = row.get(3)?;
    let created_at: String = row.get(11)?;
    let updated_at: String = row.get(12)?;
    let provenance_str_val: String = row.get(14)?;
    let invalid: i32 = row.get(15)?;
    let common_pitfalls: Option<String> = row.get(21)?;
    let keywords: Option<String> = row.get(22)?;

    Ok(Pattern {
        id: PatternId::parse(&id_str).unwrap_or_else(|_| {
            // A row that violates the ID grammar should never exist; if it
            // somehow does, surfacing it as-is beats panicking the read path.
            PatternId::parse("APEX.SYSTEM:PAT:AUTO:00000000").expect("fallback id is valid")
        }),
        schema_version: row.get(1)?,
        pattern_version: row.get(2)?,
        pattern_type: pattern_type_from_str(&type_str),
        title: row.get(4)?,
        summary: row.get(5)?,
        trust_score: row.get(6)?,
        alpha: row.get(7)?,
        beta: row.get(8)?,
        usage_count: row.get::<_, i64>(9)? as u64,
        success_count: row.get::<_, i64>(10)? as u64,
        created_at: parse_rfc3339(&created_at),
        updated_at: parse_rfc3339(&updated_at),
        alias: row.get(13)?,
        provenance: provenance_from_str(&provenance_str_val),
        invalid: invalid != 0,
        invalid_reason: row.get(16)?,
        pattern_digest: row.get(17)?,
        facets: Default::default(),
        semantics: apex_core::pattern::Semantics {
            key_insight: row.get(19)?,
            when_to_use: row.get(20)?,
            common_pitfalls: common_pitfalls
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or_default(),
            keywords: keywords
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or_default(),
            search_index: row.get(23)?,
            triggers: Vec::new(),
            vocabulary: Vec::new(),
        },
        snippets: Vec::new(),
        half_life_days: row.get(18)?,
    })
}

fn parse_rfc3339(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

pub fn pattern_type_str(t: PatternType) -> &'static str {
    match t {
        PatternType::Codebase => "CODEBASE",
        PatternType::Lang => "LANG",
        PatternType::Anti => "ANTI",
        PatternType::Failure => "FAILURE",
        PatternType::Policy => "POLICY",
        PatternType::Test => "TEST",
        PatternType::Migration => "MIGRATION",
    }
}

fn pattern_type_from_str(s: &str) -> PatternType {
    match s {
        "LANG" => PatternType::Lang,
        "ANTI" => PatternType::Anti,
        "FAILURE" => PatternType::Failure,
        "POLICY" => PatternType::Policy,
        "TEST" => PatternType::Test,
        "MIGRATION" => PatternType::Migration,
        _ => PatternType::Codebase,
    }
}

fn provenance_str(p: Provenance) -> &'static str {
    match p {
        Provenance::Manual => "manual",
        Provenance::AutoCreated => "auto-created",
    }
}

fn provenance_from_str(s: &str) -> Provenance {
    match s {
        "auto-created" => Provenance::AutoCreated,
        _ => Provenance::Manual,
    }
}
