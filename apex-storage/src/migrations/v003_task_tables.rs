//! v003: tasks and their collaborator logs (spec.md §3, §4.8).

use rusqlite::Connection;

use crate::error::StorageResult;
use crate::migrations::Migration;

pub fn migration() -> Migration {
    Migration {
        version: 3,
        name: "task_tables",
        up,
        down,
        validate: Some(validate),
    }
}

fn up(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS tasks (
            id           TEXT PRIMARY KEY,
            human_id     TEXT,
            title        TEXT NOT NULL,
            intent       TEXT NOT NULL,
            task_type    TEXT NOT NULL,
            status       TEXT NOT NULL,
            phase        TEXT NOT NULL,
            confidence   REAL NOT NULL,
            tags         TEXT NOT NULL,
            created_at   TEXT NOT NULL,
            updated_at   TEXT NOT NULL,
            completed_at TEXT,
            duration_ms  INTEGER,
            outcome      TEXT,
            key_learning TEXT,
            brief        TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);

        CREATE TABLE IF NOT EXISTS task_files (
            task_id    TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            file_path  TEXT NOT NULL,
            touched_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_task_files_task ON task_files(task_id);

        CREATE TABLE IF NOT EXISTS task_evidence (
            task_id     TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            kind        TEXT NOT NULL,
            payload     TEXT NOT NULL,
            recorded_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_task_evidence_task ON task_evidence(task_id);

        CREATE TABLE IF NOT EXISTS task_similarity (
            task_a TEXT NOT NULL,
            task_b TEXT NOT NULL,
            score  REAL NOT NULL,
            PRIMARY KEY (task_a, task_b),
            CHECK (task_a < task_b)
        );
        ",
    )?;
    Ok(())
}

fn down(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        "
        DROP TABLE IF EXISTS task_similarity;
        DROP TABLE IF EXISTS task_evidence;
        DROP TABLE IF EXISTS task_files;
        DROP TABLE IF EXISTS tasks;
        ",
    )?;
    Ok(())
}

fn validate(conn: &Connection) -> StorageResult<bool> {
    let exists: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='tasks'",
            [],
            |_| Ok(true),
        )
        .unwrap_or(false);
    Ok(exists)
}
