//! v002: full-text index over (title, summary, tags, keywords, search_index).
//!
//! No sync triggers are created here even though the adapter reports
//! `supports_fts_triggers() == true` (spec.md §4.1): the repository always
//! maintains `patterns_fts` explicitly inside the same write transaction
//! (§4.3), so a trigger-based path would double-write on every upsert.

use rusqlite::Connection;

use crate::error::StorageResult;
use crate::migrations::Migration;

pub fn migration() -> Migration {
    Migration {
        version: 2,
        name: "fts_index",
        up,
        down,
        validate: Some(validate),
    }
}

fn up(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        "CREATE VIRTUAL TABLE IF NOT EXISTS patterns_fts USING fts5(
            pattern_id UNINDEXED,
            title,
            summary,
            tags,
            keywords,
            search_index
        );",
    )?;
    Ok(())
}

fn down(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch("DROP TABLE IF EXISTS patterns_fts;")?;
    Ok(())
}

fn validate(conn: &Connection) -> StorageResult<bool> {
    let exists: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='patterns_fts'",
            [],
            |_| Ok(true),
        )
        .unwrap_or(false);
    Ok(exists)
}
