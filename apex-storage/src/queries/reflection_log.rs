//! Append-only writes backing the reflection engine's audit trail
//! (spec.md §4.5 step 7, §1).

use chrono::Utc;
use rusqlite::{params, Connection};

use crate::error::StorageResult;

/// Insert one reflection audit row and return its `reflection_id`.
pub fn insert_reflection(
    conn: &Connection,
    task_id: &str,
    outcome: &str,
    applied_updates_json: &str,
    created_patterns_json: &str,
    learnings_json: &str,
) -> StorageResult<i64> {
    conn.execute(
        "INSERT INTO reflections (task_id, outcome, applied_updates, created_patterns, learnings, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            task_id,
            outcome,
            applied_updates_json,
            created_patterns_json,
            learnings_json,
            Utc::now().to_rfc3339()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// `pattern_id` is not a foreign key (see v004 migration), so this never
/// fails because a pattern was later deleted.
pub fn insert_pattern_evidence(
    conn: &Connection,
    pattern_id: &str,
    reflection_id: Option<i64>,
    kind: &str,
    payload_json: &str,
) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO pattern_evidence (pattern_id, reflection_id, kind, payload, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![pattern_id, reflection_id, kind, payload_json, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

pub fn insert_task_evidence(
    conn: &Connection,
    task_id: &str,
    kind: &str,
    payload_json: &str,
) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO task_evidence (task_id, kind, payload, recorded_at) VALUES (?1, ?2, ?3, ?4)",
        params![task_id, kind, payload_json, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::RusqliteAdapter;
    use crate::adapter::SqlAdapter;
    use crate::migrations::run_migrations;

    fn seed_task(conn: &Connection, id: &str) {
        conn.execute(
            "INSERT INTO tasks (id, human_id, title, intent, task_type, status, phase,
                confidence, tags, created_at, updated_at, completed_at, duration_ms,
                outcome, key_learning, brief)
             VALUES (?1, NULL, 'title', 'intent', 'feature', 'active', 'ARCHITECT',
                0.3, '[]', ?2, ?2, NULL, NULL, NULL, NULL, '{}')",
            params![id, Utc::now().to_rfc3339()],
        )
        .unwrap();
    }

    #[test]
    fn reflection_and_evidence_round_trip() {
        let adapter = RusqliteAdapter::open_in_memory().unwrap();
        adapter.with_connection(|conn| run_migrations(conn).map(|_| ())).unwrap();
        adapter
            .transaction(|conn| {
                seed_task(conn, "task-1");
                let reflection_id = insert_reflection(conn, "task-1", "success", "[]", "[]", "[]")?;
                insert_pattern_evidence(conn, "TEST:PATTERN", Some(reflection_id), "commit", "{}")?;
                insert_task_evidence(conn, "task-1", "commit", "{}")?;
                Ok(())
            })
            .unwrap();

        let count: i64 = adapter
            .with_connection(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM pattern_evidence", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 1);
    }
}
