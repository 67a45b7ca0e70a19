//! Migration runner — ordered, idempotent, reversible schema evolution
//! (spec.md §4.2).

mod v001_initial_schema;
mod v002_fts_index;
mod v003_task_tables;
mod v004_evidence_log;

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::error::{StorageError, StorageResult};

/// A migration: monotonically increasing version, name, forward/backward
/// SQL, and an optional post-`up` validation hook.
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub up: fn(&Connection) -> StorageResult<()>,
    pub down: fn(&Connection) -> StorageResult<()>,
    pub validate: Option<fn(&Connection) -> StorageResult<bool>>,
}

/// All migrations in ascending version order.
fn all_migrations() -> Vec<Migration> {
    vec![
        v001_initial_schema::migration(),
        v002_fts_index::migration(),
        v003_task_tables::migration(),
        v004_evidence_log::migration(),
    ]
}

pub const LATEST_VERSION: u32 = 4;

fn ensure_migrations_table(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS migrations (
            version         INTEGER PRIMARY KEY,
            id              TEXT NOT NULL,
            name            TEXT NOT NULL,
            checksum        TEXT,
            applied_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
            execution_time_ms INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS schema_meta (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;
    Ok(())
}

/// Highest applied version recorded in the `migrations` table (0 if none).
pub fn current_version(conn: &Connection) -> StorageResult<u32> {
    ensure_migrations_table(conn)?;
    let version: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM migrations",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Apply all pending migrations in order, each inside its own transaction.
/// Returns the number applied. A `validate` failure aborts start-up with no
/// partial success recorded (the failing migration's transaction is rolled
/// back before the error propagates).
pub fn run_migrations(conn: &Connection) -> StorageResult<u32> {
    ensure_migrations_table(conn)?;
    let current = current_version(conn)?;
    let mut applied = 0;

    if current >= LATEST_VERSION {
        debug!("schema up to date at v{current}");
        sync_schema_meta(conn)?;
        return Ok(0);
    }

    info!("running migrations: v{current} -> v{LATEST_VERSION}");

    for migration in all_migrations() {
        if migration.version <= current {
            continue;
        }

        debug!("applying migration v{:03}: {}", migration.version, migration.name);
        let started = std::time::Instant::now();

        conn.execute_batch("BEGIN IMMEDIATE")?;

        let outcome: StorageResult<()> = (|| {
            (migration.up)(conn)?;
            if let Some(validate) = migration.validate {
                if !validate(conn)? {
                    return Err(StorageError::MigrationValidationFailed {
                        version: migration.version,
                    });
                }
            }
            let elapsed_ms = started.elapsed().as_millis() as i64;
            conn.execute(
                "INSERT INTO migrations (version, id, name, checksum, execution_time_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    migration.version,
                    format!("v{:03}", migration.version),
                    migration.name,
                    Option::<String>::None,
                    elapsed_ms,
                ],
            )?;
            Ok(())
        })();

        match outcome {
            Ok(()) => {
                conn.execute_batch("COMMIT")?;
                info!("applied migration v{:03}: {}", migration.version, migration.name);
                applied += 1;
            }
            Err(e) => {
                warn!("migration v{:03} failed: {e}, rolling back", migration.version);
                let _ = conn.execute_batch("ROLLBACK");
                return Err(StorageError::MigrationFailed {
                    version: migration.version,
                    reason: e.to_string(),
                });
            }
        }
    }

    sync_schema_meta(conn)?;
    info!("applied {applied} migration(s), now at v{LATEST_VERSION}");
    Ok(applied)
}

/// Keep `schema_meta.schema_version` equal to the migrations table's max
/// version (Open Question in spec.md §9 — resolved in DESIGN.md: kept
/// synchronized on every run rather than allowed to lag).
fn sync_schema_meta(conn: &Connection) -> StorageResult<()> {
    let version = current_version(conn)?;
    conn.execute(
        "INSERT INTO schema_meta (key, value) VALUES ('schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        rusqlite::params![version.to_string()],
    )?;
    Ok(())
}

/// Verify `schema_meta.schema_version` and `MAX(migrations.version)` agree
/// (spec.md §6: "they MUST agree on start-up").
pub fn assert_schema_consistent(conn: &Connection) -> StorageResult<()> {
    let migrations_version = current_version(conn)?;
    let schema_meta_version: u32 = conn
        .query_row(
            "SELECT value FROM schema_meta WHERE key = 'schema_version'",
            [],
            |row| row.get::<_, String>(0),
        )
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    if schema_meta_version != migrations_version {
        return Err(StorageError::SchemaDrift {
            schema_meta_version,
            migrations_version,
        });
    }
    Ok(())
}

/// Run `up` then `down` for every migration against a fresh in-memory
/// database and confirm the set of tables returns to empty (spec.md §4.2
/// "sequential-application test hook" / §8 reversibility invariant).
pub fn dry_run_reversibility() -> StorageResult<()> {
    let conn = Connection::open_in_memory()?;
    ensure_migrations_table(&conn)?;

    let tables_before = table_names(&conn)?;

    for migration in all_migrations() {
        (migration.up)(&conn)?;
    }
    for migration in all_migrations().into_iter().rev() {
        (migration.down)(&conn)?;
    }

    let tables_after = table_names(&conn)?;
    if tables_before != tables_after {
        return Err(StorageError::MigrationFailed {
            version: 0,
            reason: format!(
                "reversibility check failed: {tables_before:?} != {tables_after:?}"
            ),
        });
    }
    Ok(())
}

fn table_names(conn: &Connection) -> StorageResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type='table' ORDER BY name",
    )?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut names = Vec::new();
    for r in rows {
        names.push(r?);
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_all_migrations_in_order() {
        let conn = Connection::open_in_memory().unwrap();
        let applied = run_migrations(&conn).unwrap();
        assert_eq!(applied, LATEST_VERSION);
        assert_eq!(current_version(&conn).unwrap(), LATEST_VERSION);
    }

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        let applied_again = run_migrations(&conn).unwrap();
        assert_eq!(applied_again, 0);
    }

    #[test]
    fn schema_meta_and_migrations_agree_after_run() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        assert_schema_consistent(&conn).unwrap();
    }

    #[test]
    fn reversibility_dry_run_passes() {
        dry_run_reversibility().unwrap();
    }
}
