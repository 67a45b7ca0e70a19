//! Full-text index maintenance and bm25-ordered search (spec.md §4.3).
//!
//! Invariant (spec.md §3): an FTS row exists iff `invalid = 0`.

use rusqlite::{params, Connection};

use crate::error::StorageResult;

pub fn sync_fts_row(
    conn: &Connection,
    pattern_id: &str,
    title: &str,
    summary: &str,
    tags: &str,
    keywords: &str,
    search_index: &str,
    invalid: bool,
) -> StorageResult<()> {
    conn.execute(
        "DELETE FROM patterns_fts WHERE pattern_id = ?1",
        params![pattern_id],
    )?;
    if !invalid {
        conn.execute(
            "INSERT INTO patterns_fts (pattern_id, title, summary, tags, keywords, search_index)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![pattern_id, title, summary, tags, keywords, search_index],
        )?;
    }
    Ok(())
}

pub fn remove_fts_row(conn: &Connection, pattern_id: &str) -> StorageResult<()> {
    conn.execute(
        "DELETE FROM patterns_fts WHERE pattern_id = ?1",
        params![pattern_id],
    )?;
    Ok(())
}

/// bm25-ranked search over (title, summary, tags, keywords, search_index),
/// excluding invalidated patterns (enforced structurally: invalid patterns
/// never have an FTS row).
pub fn search(conn: &Connection, query: &str, limit: usize) -> StorageResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT pattern_id FROM patterns_fts
         WHERE patterns_fts MATCH ?1
         ORDER BY bm25(patterns_fts)
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![sanitize_fts_query(query), limit as i64], |row| {
        row.get::<_, String>(0)
    })?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// FTS5 query syntax treats several characters specially; quote the whole
/// phrase so arbitrary user task text never trips a syntax error.
fn sanitize_fts_query(query: &str) -> String {
    format!("\"{}\"", query.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::run_migrations;

    #[test]
    fn sync_respects_invalid_flag() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        sync_fts_row(&conn, "P:ONE", "Title", "Summary", "", "", "", false).unwrap();
        let results = search(&conn, "Title", 10).unwrap();
        assert_eq!(results, vec!["P:ONE".to_string()]);

        sync_fts_row(&conn, "P:ONE", "Title", "Summary", "", "", "", true).unwrap();
        let results = search(&conn, "Title", 10).unwrap();
        assert!(results.is_empty());
    }
}
