//! Alias assignment: slug from title, collision-safe (spec.md §4.3).

use rusqlite::{params, Connection};

use crate::error::StorageResult;

/// Lowercase the title, replace runs of non-alphanumerics with `-`, trim
/// leading/trailing `-`, and cap at 100 chars.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_was_dash = false;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash && !slug.is_empty() {
            slug.push('-');
            last_was_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug.truncate(100);
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Assign a unique alias derived from `title` to `pattern_id`. On
/// collision, appends `-1`, `-2`, … until a free slug is found.
pub fn assign_alias(conn: &Connection, pattern_id: &str, title: &str) -> StorageResult<String> {
    let base = slugify(title);
    let mut candidate = base.clone();
    let mut suffix = 0u32;

    loop {
        let taken: bool = conn
            .query_row(
                "SELECT 1 FROM patterns WHERE alias = ?1 AND id != ?2",
                params![candidate, pattern_id],
                |_| Ok(true),
            )
            .unwrap_or(false);

        if !taken {
            break;
        }
        suffix += 1;
        let suffix_str = format!("-{suffix}");
        let max_base_len = 100usize.saturating_sub(suffix_str.len());
        let mut truncated = base.clone();
        truncated.truncate(max_base_len);
        candidate = format!("{truncated}{suffix_str}");
    }

    conn.execute(
        "UPDATE patterns SET alias = ?1 WHERE id = ?2",
        params![candidate, pattern_id],
    )?;

    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::run_migrations;

    fn insert_bare_pattern(conn: &Connection, id: &str) {
        conn.execute(
            "INSERT INTO patterns (id, schema_version, pattern_version, type, title, summary,
                trust_score, alpha, beta, created_at, updated_at, provenance,
                pattern_digest, json_canonical)
             VALUES (?1, 1, 1, 'CODEBASE', 'x', 'x', 0.3, 1, 1, '2024-01-01T00:00:00Z',
                '2024-01-01T00:00:00Z', 'manual', 'deadbeef', X'7b7d')",
            params![id],
        )
        .unwrap();
    }

    #[test]
    fn slugify_lowercases_and_dashes() {
        assert_eq!(slugify("Duplicate Pattern"), "duplicate-pattern");
        assert_eq!(slugify("  Weird!! Title__"), "weird-title");
    }

    #[test]
    fn collision_appends_incrementing_suffix() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        insert_bare_pattern(&conn, "P:ONE");
        insert_bare_pattern(&conn, "P:TWO");

        let a = assign_alias(&conn, "P:ONE", "Duplicate Pattern").unwrap();
        let b = assign_alias(&conn, "P:TWO", "Duplicate Pattern").unwrap();
        assert_eq!(a, "duplicate-pattern");
        assert_eq!(b, "duplicate-pattern-1");
    }
}
