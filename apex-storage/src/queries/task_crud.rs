//! Task row mapping and CRUD (spec.md §3, §4.8).

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use apex_core::task::{Task, TaskBrief, TaskPhase, TaskStatus};

use crate::error::{StorageError, StorageResult};

const TASK_COLUMNS: &str = "id, human_id, title, intent, task_type, status, phase, confidence,
    tags, created_at, updated_at, completed_at, duration_ms, outcome, key_learning, brief";

pub fn insert(conn: &Connection, task: &Task) -> StorageResult<()> {
    let tags_json = serde_json::to_string(&task.tags)?;
    let brief_json = serde_json::to_string(&task.brief)?;
    conn.execute(
        &format!(
            "INSERT INTO tasks ({TASK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
        ),
        params![
            task.id,
            task.human_id,
            task.title,
            task.intent,
            task.task_type,
            status_str(task.status),
            phase_str(task.phase),
            task.confidence,
            tags_json,
            task.created_at.to_rfc3339(),
            task.updated_at.to_rfc3339(),
            task.completed_at.map(|t| t.to_rfc3339()),
            task.duration_ms,
            task.outcome,
            task.key_learning,
            brief_json,
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, id: &str) -> StorageResult<Option<Task>> {
    conn.query_row(
        &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
        params![id],
        row_to_task,
    )
    .optional()
    .map_err(StorageError::from)
}

/// Persist the whole task row back; the engine mutates a `Task` in memory
/// and calls this once per change, mirroring `PatternRepository::upsert`.
pub fn update(conn: &Connection, task: &Task) -> StorageResult<()> {
    let tags_json = serde_json::to_string(&task.tags)?;
    let brief_json = serde_json::to_string(&task.brief)?;
    let changed = conn.execute(
        "UPDATE tasks SET human_id = ?2, title = ?3, intent = ?4, task_type = ?5, status = ?6,
            phase = ?7, confidence = ?8, tags = ?9, updated_at = ?10, completed_at = ?11,
            duration_ms = ?12, outcome = ?13, key_learning = ?14, brief = ?15
         WHERE id = ?1",
        params![
            task.id,
            task.human_id,
            task.title,
            task.intent,
            task.task_type,
            status_str(task.status),
            phase_str(task.phase),
            task.confidence,
            tags_json,
            task.updated_at.to_rfc3339(),
            task.completed_at.map(|t| t.to_rfc3339()),
            task.duration_ms,
            task.outcome,
            task.key_learning,
            brief_json,
        ],
    )?;
    if changed == 0 {
        return Err(StorageError::TaskNotFound { id: task.id.clone() });
    }
    Ok(())
}

pub fn list_active(conn: &Connection) -> StorageResult<Vec<Task>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE status = 'active' ORDER BY created_at"
    ))?;
    let rows = stmt.query_map([], row_to_task)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn insert_file_touch(conn: &Connection, task_id: &str, file_path: &str) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO task_files (task_id, file_path, touched_at) VALUES (?1, ?2, ?3)",
        params![task_id, file_path, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

pub fn upsert_similarity(conn: &Connection, task_a: &str, task_b: &str, score: f64) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO task_similarity (task_a, task_b, score) VALUES (?1, ?2, ?3)
         ON CONFLICT(task_a, task_b) DO UPDATE SET score = excluded.score",
        params![task_a, task_b, score],
    )?;
    Ok(())
}

/// Every cached neighbour of `task_id`, most similar first, regardless of
/// which side of the canonical `(task_a, task_b)` ordering it landed on.
pub fn list_similar(conn: &Connection, task_id: &str, limit: usize) -> StorageResult<Vec<(String, f64)>> {
    let mut stmt = conn.prepare(
        "SELECT task_a, task_b, score FROM task_similarity
         WHERE task_a = ?1 OR task_b = ?1
         ORDER BY score DESC LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![task_id, limit as i64], |row| {
        let a: String = row.get(0)?;
        let b: String = row.get(1)?;
        let score: f64 = row.get(2)?;
        let other = if a == task_id { b } else { a };
        Ok((other, score))
    })?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// Completion clears a task's similarity cache rows (§4.9).
pub fn clear_similarity(conn: &Connection, task_id: &str) -> StorageResult<()> {
    conn.execute(
        "DELETE FROM task_similarity WHERE task_a = ?1 OR task_b = ?1",
        params![task_id],
    )?;
    Ok(())
}

fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
    let tags_json: String = row.get(8)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;
    let completed_at: Option<String> = row.get(11)?;
    let brief_json: String = row.get(15)?;
    let status_str_val: String = row.get(5)?;
    let phase_str_val: String = row.get(6)?;

    Ok(Task {
        id: row.get(0)?,
        human_id: row.get(1)?,
        title: row.get(2)?,
        intent: row.get(3)?,
        task_type: row.get(4)?,
        status: status_from_str(&status_str_val),
        phase: phase_from_str(&phase_str_val),
        confidence: row.get(7)?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        created_at: parse_rfc3339(&created_at),
        updated_at: parse_rfc3339(&updated_at),
        completed_at: completed_at.as_deref().map(parse_rfc3339),
        duration_ms: row.get(12)?,
        outcome: row.get(13)?,
        key_learning: row.get(14)?,
        brief: serde_json::from_str(&brief_json).unwrap_or_else(|_| TaskBrief::default()),
    })
}

fn parse_rfc3339(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn status_str(s: TaskStatus) -> &'static str {
    match s {
        TaskStatus::Active => "active",
        TaskStatus::Completed => "completed",
        TaskStatus::Failed => "failed",
        TaskStatus::Blocked => "blocked",
    }
}

fn status_from_str(s: &str) -> TaskStatus {
    match s {
        "completed" => TaskStatus::Completed,
        "failed" => TaskStatus::Failed,
        "blocked" => TaskStatus::Blocked,
        _ => TaskStatus::Active,
    }
}

fn phase_str(p: TaskPhase) -> &'static str {
    match p {
        TaskPhase::Architect => "ARCHITECT",
        TaskPhase::Builder => "BUILDER",
        TaskPhase::BuilderValidator => "BUILDER_VALIDATOR",
        TaskPhase::Validator => "VALIDATOR",
        TaskPhase::Reviewer => "REVIEWER",
        TaskPhase::Documenter => "DOCUMENTER",
        TaskPhase::Research => "RESEARCH",
    }
}

fn phase_from_str(s: &str) -> TaskPhase {
    match s {
        "BUILDER" => TaskPhase::Builder,
        "BUILDER_VALIDATOR" => TaskPhase::BuilderValidator,
        "VALIDATOR" => TaskPhase::Validator,
        "REVIEWER" => TaskPhase::Reviewer,
        "DOCUMENTER" => TaskPhase::Documenter,
        "RESEARCH" => TaskPhase::Research,
        _ => TaskPhase::Architect,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::RusqliteAdapter;
    use crate::adapter::SqlAdapter;
    use crate::migrations::run_migrations;

    fn sample_task(id: &str) -> Task {
        let now = Utc::now();
        Task {
            id: id.to_string(),
            human_id: None,
            title: "Add caching layer".to_string(),
            intent: "speed up reads".to_string(),
            task_type: "feature".to_string(),
            status: TaskStatus::Active,
            phase: TaskPhase::Architect,
            confidence: 0.3,
            tags: vec!["perf".to_string()],
            created_at: now,
            updated_at: now,
            completed_at: None,
            duration_ms: None,
            outcome: None,
            key_learning: None,
            brief: TaskBrief::default(),
        }
    }

    #[test]
    fn insert_then_get_round_trips() {
        let adapter = RusqliteAdapter::open_in_memory().unwrap();
        adapter.with_connection(|conn| run_migrations(conn).map(|_| ())).unwrap();
        adapter.with_connection(|conn| insert(conn, &sample_task("task-1"))).unwrap();

        let fetched = adapter.with_connection(|conn| get(conn, "task-1")).unwrap().unwrap();
        assert_eq!(fetched.title, "Add caching layer");
        assert_eq!(fetched.phase, TaskPhase::Architect);
        assert_eq!(fetched.tags, vec!["perf".to_string()]);
    }

    #[test]
    fn update_missing_task_errors() {
        let adapter = RusqliteAdapter::open_in_memory().unwrap();
        adapter.with_connection(|conn| run_migrations(conn).map(|_| ())).unwrap();
        let err = adapter.with_connection(|conn| update(conn, &sample_task("ghost"))).unwrap_err();
        assert!(matches!(err, StorageError::TaskNotFound { .. }));
    }

    #[test]
    fn similarity_round_trips_from_either_side() {
        let adapter = RusqliteAdapter::open_in_memory().unwrap();
        adapter.with_connection(|conn| run_migrations(conn).map(|_| ())).unwrap();
        adapter.with_connection(|conn| insert(conn, &sample_task("a"))).unwrap();
        adapter.with_connection(|conn| insert(conn, &sample_task("b"))).unwrap();
        adapter.with_connection(|conn| upsert_similarity(conn, "a", "b", 0.7)).unwrap();

        let from_a = adapter.with_connection(|conn| list_similar(conn, "a", 10)).unwrap();
        assert_eq!(from_a, vec![("b".to_string(), 0.7)]);
        let from_b = adapter.with_connection(|conn| list_similar(conn, "b", 10)).unwrap();
        assert_eq!(from_b, vec![("a".to_string(), 0.7)]);
    }

    #[test]
    fn clear_similarity_removes_both_sides() {
        let adapter = RusqliteAdapter::open_in_memory().unwrap();
        adapter.with_connection(|conn| run_migrations(conn).map(|_| ())).unwrap();
        adapter.with_connection(|conn| insert(conn, &sample_task("a"))).unwrap();
        adapter.with_connection(|conn| insert(conn, &sample_task("b"))).unwrap();
        adapter.with_connection(|conn| upsert_similarity(conn, "a", "b", 0.7)).unwrap();
        adapter.with_connection(|conn| clear_similarity(conn, "a")).unwrap();
        assert!(adapter.with_connection(|conn| list_similar(conn, "b", 10)).unwrap().is_empty());
    }
}
