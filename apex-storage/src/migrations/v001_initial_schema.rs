//! v001: patterns, facet tables, snippets.

use rusqlite::Connection;

use crate::error::StorageResult;
use crate::migrations::Migration;

pub fn migration() -> Migration {
    Migration {
        version: 1,
        name: "initial_schema",
        up,
        down,
        validate: Some(validate),
    }
}

fn up(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS patterns (
            id              TEXT PRIMARY KEY,
            schema_version  INTEGER NOT NULL,
            pattern_version INTEGER NOT NULL,
            type            TEXT NOT NULL,
            title           TEXT NOT NULL,
            summary         TEXT NOT NULL,
            trust_score     REAL NOT NULL,
            alpha           REAL NOT NULL,
            beta            REAL NOT NULL,
            usage_count     INTEGER NOT NULL DEFAULT 0,
            success_count   INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL,
            alias           TEXT UNIQUE,
            provenance      TEXT NOT NULL,
            invalid         INTEGER NOT NULL DEFAULT 0,
            invalid_reason  TEXT,
            pattern_digest  TEXT NOT NULL,
            json_canonical  BLOB NOT NULL,
            half_life_days  REAL,
            key_insight     TEXT,
            when_to_use     TEXT,
            common_pitfalls TEXT,
            keywords        TEXT,
            search_index    TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_patterns_type ON patterns(type);
        CREATE INDEX IF NOT EXISTS idx_patterns_invalid ON patterns(invalid);

        CREATE TABLE IF NOT EXISTS pattern_languages (
            pattern_id TEXT NOT NULL REFERENCES patterns(id) ON DELETE CASCADE,
            language   TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_pattern_languages ON pattern_languages(language);
        CREATE INDEX IF NOT EXISTS idx_pattern_languages_pattern ON pattern_languages(pattern_id);

        CREATE TABLE IF NOT EXISTS pattern_frameworks (
            pattern_id TEXT NOT NULL REFERENCES patterns(id) ON DELETE CASCADE,
            name       TEXT NOT NULL,
            range      TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_pattern_frameworks ON pattern_frameworks(name);
        CREATE INDEX IF NOT EXISTS idx_pattern_frameworks_pattern ON pattern_frameworks(pattern_id);

        CREATE TABLE IF NOT EXISTS pattern_paths (
            pattern_id TEXT NOT NULL REFERENCES patterns(id) ON DELETE CASCADE,
            path       TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_pattern_paths_pattern ON pattern_paths(pattern_id);

        CREATE TABLE IF NOT EXISTS pattern_repos (
            pattern_id TEXT NOT NULL REFERENCES patterns(id) ON DELETE CASCADE,
            repo       TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_pattern_repos_pattern ON pattern_repos(pattern_id);

        CREATE TABLE IF NOT EXISTS pattern_task_types (
            pattern_id TEXT NOT NULL REFERENCES patterns(id) ON DELETE CASCADE,
            task_type  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_pattern_task_types_pattern ON pattern_task_types(pattern_id);

        CREATE TABLE IF NOT EXISTS pattern_envs (
            pattern_id TEXT NOT NULL REFERENCES patterns(id) ON DELETE CASCADE,
            env        TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_pattern_envs_pattern ON pattern_envs(pattern_id);

        CREATE TABLE IF NOT EXISTS pattern_tags (
            pattern_id TEXT NOT NULL REFERENCES patterns(id) ON DELETE CASCADE,
            tag        TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_pattern_tags ON pattern_tags(tag);
        CREATE INDEX IF NOT EXISTS idx_pattern_tags_pattern ON pattern_tags(pattern_id);

        CREATE TABLE IF NOT EXISTS pattern_triggers (
            pattern_id TEXT NOT NULL REFERENCES patterns(id) ON DELETE CASCADE,
            kind       TEXT NOT NULL,
            value      TEXT NOT NULL,
            is_regex   INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_pattern_triggers_pattern ON pattern_triggers(pattern_id);

        CREATE TABLE IF NOT EXISTS pattern_vocab (
            pattern_id TEXT NOT NULL REFERENCES patterns(id) ON DELETE CASCADE,
            term       TEXT NOT NULL,
            term_type  TEXT NOT NULL,
            weight     REAL NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_pattern_vocab_pattern ON pattern_vocab(pattern_id);

        CREATE TABLE IF NOT EXISTS snippets (
            snippet_id TEXT PRIMARY KEY,
            pattern_id TEXT NOT NULL REFERENCES patterns(id) ON DELETE CASCADE,
            label      TEXT NOT NULL,
            language   TEXT NOT NULL,
            file       TEXT,
            line_start INTEGER,
            line_end   INTEGER,
            content    TEXT NOT NULL,
            size_bytes INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_snippets_pattern ON snippets(pattern_id);
        ",
    )?;
    Ok(())
}

fn down(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        "
        DROP TABLE IF EXISTS snippets;
        DROP TABLE IF EXISTS pattern_vocab;
        DROP TABLE IF EXISTS pattern_triggers;
        DROP TABLE IF EXISTS pattern_tags;
        DROP TABLE IF EXISTS pattern_envs;
        DROP TABLE IF EXISTS pattern_task_types;
        DROP TABLE IF EXISTS pattern_repos;
        DROP TABLE IF EXISTS pattern_paths;
        DROP TABLE IF EXISTS pattern_frameworks;
        DROP TABLE IF EXISTS pattern_languages;
        DROP TABLE IF EXISTS patterns;
        ",
    )?;
    Ok(())
}

fn validate(conn: &Connection) -> StorageResult<bool> {
    let exists: bool = conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type='table' AND name='patterns'",
        [],
        |_| Ok(true),
    ).unwrap_or(false);
    Ok(exists)
}
