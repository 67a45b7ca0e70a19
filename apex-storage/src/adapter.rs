//! Uniform statement/exec/pragma/transaction interface over an embedded SQL
//! backend (spec.md §4.1, §9 "dynamic dispatch across adapters").
//!
//! Only one concrete adapter (`RusqliteAdapter`) ships in this repository —
//! see DESIGN.md for why — but callers depend solely on the `SqlAdapter`
//! trait object, so a second backend could be swapped in without touching
//! the repository, migration runner, or ranker.

use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::ReentrantMutex;
use rusqlite::Connection;

use crate::error::{StorageError, StorageResult};

/// A single pragma result row, kept deliberately loose (adapters differ in
/// whether a pragma returns one row or many).
#[derive(Debug, Clone)]
pub struct PragmaRow(pub Vec<String>);

/// Capability-tagged adapter interface. Implementations MUST report
/// `supports_fts_triggers()` honestly; callers fall back to explicit FTS
/// synchronization when it's `false`.
pub trait SqlAdapter: Send + Sync {
    /// Whether this backend can create FTS sync triggers from user SQL.
    fn supports_fts_triggers(&self) -> bool;

    /// Execute a batch of SQL with no parameters (DDL, migrations).
    fn exec(&self, sql: &str) -> StorageResult<()>;

    /// Run a pragma and collect its result rows.
    fn pragma(&self, text: &str) -> StorageResult<Vec<PragmaRow>>;

    /// Run `f` with shared access to the underlying connection, outside of
    /// any transaction. Used for plain reads.
    fn with_connection<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> StorageResult<T>;

    /// Run `f` inside a transaction. Nested calls (re-entered on the same
    /// logical caller) use savepoints; only the outermost call issues
    /// BEGIN/COMMIT/ROLLBACK (§4.1).
    fn transaction<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> StorageResult<T>;

    /// Flush any buffered state to disk (atomic replace: temp file, fsync,
    /// rename) and release resources. A no-op for backends with no
    /// in-memory buffering beyond the OS page cache.
    fn close(&self) -> StorageResult<()>;
}

/// Production adapter: a single `rusqlite::Connection` behind a reentrant
/// lock. `ReentrantMutex` (rather than `std::sync::Mutex`) is what makes
/// `transaction` able to call itself recursively for nested
/// invocations without deadlocking — the single-threaded cooperative model
/// of §5 guarantees re-entry only ever happens on the thread already
/// holding the lock.
pub struct RusqliteAdapter {
    conn: ReentrantMutex<Connection>,
    txn_depth: AtomicU32,
}

impl RusqliteAdapter {
    pub fn open(path: &std::path::Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        Self::configure(&conn)?;
        Ok(Self {
            conn: ReentrantMutex::new(conn),
            txn_depth: AtomicU32::new(0),
        })
    }

    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn)?;
        Ok(Self {
            conn: ReentrantMutex::new(conn),
            txn_depth: AtomicU32::new(0),
        })
    }

    fn configure(conn: &Connection) -> StorageResult<()> {
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(())
    }
}

impl SqlAdapter for RusqliteAdapter {
    fn supports_fts_triggers(&self) -> bool {
        // sqlite3 (via rusqlite) supports creating FTS5 sync triggers from
        // plain SQL; the repository still maintains the FTS table
        // explicitly in the same transaction as a belt-and-braces measure
        // (spec.md §4.3), so this flag mainly documents the capability.
        true
    }

    fn exec(&self, sql: &str) -> StorageResult<()> {
        let guard = self.conn.lock();
        guard.execute_batch(sql)?;
        Ok(())
    }

    fn pragma(&self, text: &str) -> StorageResult<Vec<PragmaRow>> {
        let guard = self.conn.lock();
        let mut stmt = guard.prepare(&format!("PRAGMA {text}"))?;
        let col_count = stmt.column_count();
        let rows = stmt.query_map([], |row| {
            let mut values = Vec::with_capacity(col_count);
            for i in 0..col_count {
                let v: rusqlite::types::Value = row.get(i)?;
                values.push(pragma_value_to_string(v));
            }
            Ok(PragmaRow(values))
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    fn with_connection<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> StorageResult<T>,
    {
        let guard = self.conn.lock();
        f(&guard)
    }

    fn transaction<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> StorageResult<T>,
    {
        let guard = self.conn.lock();
        let depth = self.txn_depth.fetch_add(1, Ordering::SeqCst);

        if depth == 0 {
            guard.execute_batch("BEGIN IMMEDIATE")?;
        } else {
            guard.execute_batch(&format!("SAVEPOINT sp_{depth}"))?;
        }

        let result = f(&guard);

        match &result {
            Ok(_) => {
                if depth == 0 {
                    guard.execute_batch("COMMIT")?;
                } else {
                    guard.execute_batch(&format!("RELEASE sp_{depth}"))?;
                }
            }
            Err(_) => {
                if depth == 0 {
                    let _ = guard.execute_batch("ROLLBACK");
                } else {
                    let _ = guard.execute_batch(&format!("ROLLBACK TO sp_{depth}"));
                    let _ = guard.execute_batch(&format!("RELEASE sp_{depth}"));
                }
            }
        }

        self.txn_depth.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn close(&self) -> StorageResult<()> {
        // rusqlite flushes WAL on drop; an explicit checkpoint here makes
        // the "atomic file replace" contract of §4.1 concrete for this
        // backend (WAL checkpoint is itself atomic at the page level).
        let guard = self.conn.lock();
        guard.pragma_query(None, "wal_checkpoint", |_| Ok(())).ok();
        Ok(())
    }
}

fn pragma_value_to_string(v: rusqlite::types::Value) -> String {
    use rusqlite::types::Value;
    match v {
        Value::Null => String::new(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s,
        Value::Blob(b) => format!("<{} bytes>", b.len()),
    }
}
