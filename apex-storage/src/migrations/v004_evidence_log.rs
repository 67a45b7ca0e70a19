//! v004: reflection audit trail and the pattern store's append-only
//! evidence log (spec.md §1 "append-only evidence log", §4.5 step 7).

use rusqlite::Connection;

use crate::error::StorageResult;
use crate::migrations::Migration;

pub fn migration() -> Migration {
    Migration {
        version: 4,
        name: "evidence_log",
        up,
        down,
        validate: Some(validate),
    }
}

fn up(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS reflections (
            reflection_id    INTEGER PRIMARY KEY AUTOINCREMENT,
            task_id          TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            outcome          TEXT NOT NULL,
            applied_updates  TEXT NOT NULL,
            created_patterns TEXT NOT NULL,
            learnings        TEXT NOT NULL,
            created_at       TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_reflections_task ON reflections(task_id);

        -- pattern_id is intentionally NOT a foreign key: deleting a pattern
        -- (spec.md §4.3) must not cascade to, or be blocked by, its
        -- historical evidence trail.
        CREATE TABLE IF NOT EXISTS pattern_evidence (
            evidence_id   INTEGER PRIMARY KEY AUTOINCREMENT,
            pattern_id    TEXT NOT NULL,
            reflection_id INTEGER,
            kind          TEXT NOT NULL,
            payload       TEXT NOT NULL,
            recorded_at   TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_pattern_evidence_pattern ON pattern_evidence(pattern_id);
        ",
    )?;
    Ok(())
}

fn down(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        "
        DROP TABLE IF EXISTS pattern_evidence;
        DROP TABLE IF EXISTS reflections;
        ",
    )?;
    Ok(())
}

fn validate(conn: &Connection) -> StorageResult<bool> {
    let exists: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='reflections'",
            [],
            |_| Ok(true),
        )
        .unwrap_or(false);
    Ok(exists)
}
