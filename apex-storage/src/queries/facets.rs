//! Facet row maintenance: every row FKs to a pattern and cascades on
//! delete (spec.md §3 invariant d).

use rusqlite::{params, Connection};

use apex_core::pattern::{Facets, FrameworkRef, Semantics, Trigger, TriggerKind, VocabTerm, VocabTermType};

use crate::error::StorageResult;

pub fn replace_facets(conn: &Connection, pattern_id: &str, facets: &Facets) -> StorageResult<()> {
    clear_facets(conn, pattern_id)?;

    for lang in &facets.languages {
        conn.execute(
            "INSERT INTO pattern_languages (pattern_id, language) VALUES (?1, ?2)",
            params![pattern_id, lang],
        )?;
    }
    for fw in &facets.frameworks {
        conn.execute(
            "INSERT INTO pattern_frameworks (pattern_id, name, range) VALUES (?1, ?2, ?3)",
            params![pattern_id, fw.name, fw.range],
        )?;
    }
    for path in &facets.paths {
        conn.execute(
            "INSERT INTO pattern_paths (pattern_id, path) VALUES (?1, ?2)",
            params![pattern_id, path],
        )?;
    }
    for repo in &facets.repos {
        conn.execute(
            "INSERT INTO pattern_repos (pattern_id, repo) VALUES (?1, ?2)",
            params![pattern_id, repo],
        )?;
    }
    for tt in &facets.task_types {
        conn.execute(
            "INSERT INTO pattern_task_types (pattern_id, task_type) VALUES (?1, ?2)",
            params![pattern_id, tt],
        )?;
    }
    for env in &facets.envs {
        conn.execute(
            "INSERT INTO pattern_envs (pattern_id, env) VALUES (?1, ?2)",
            params![pattern_id, env],
        )?;
    }
    for tag in &facets.tags {
        conn.execute(
            "INSERT INTO pattern_tags (pattern_id, tag) VALUES (?1, ?2)",
            params![pattern_id, tag],
        )?;
    }
    Ok(())
}

pub fn replace_semantics(conn: &Connection, pattern_id: &str, semantics: &Semantics) -> StorageResult<()> {
    conn.execute(
        "DELETE FROM pattern_triggers WHERE pattern_id = ?1",
        params![pattern_id],
    )?;
    conn.execute(
        "DELETE FROM pattern_vocab WHERE pattern_id = ?1",
        params![pattern_id],
    )?;

    for trigger in &semantics.triggers {
        conn.execute(
            "INSERT INTO pattern_triggers (pattern_id, kind, value, is_regex) VALUES (?1, ?2, ?3, ?4)",
            params![
                pattern_id,
                trigger_kind_str(trigger.kind),
                trigger.value,
                trigger.is_regex as i32
            ],
        )?;
    }
    for term in &semantics.vocabulary {
        conn.execute(
            "INSERT INTO pattern_vocab (pattern_id, term, term_type, weight) VALUES (?1, ?2, ?3, ?4)",
            params![pattern_id, term.term, vocab_type_str(term.term_type), term.weight],
        )?;
    }
    Ok(())
}

fn clear_facets(conn: &Connection, pattern_id: &str) -> StorageResult<()> {
    for table in [
        "pattern_languages",
        "pattern_frameworks",
        "pattern_paths",
        "pattern_repos",
        "pattern_task_types",
        "pattern_envs",
        "pattern_tags",
    ] {
        conn.execute(
            &format!("DELETE FROM {table} WHERE pattern_id = ?1"),
            params![pattern_id],
        )?;
    }
    Ok(())
}

pub fn load_facets(conn: &Connection, pattern_id: &str) -> StorageResult<Facets> {
    Ok(Facets {
        languages: collect_strings(conn, "SELECT language FROM pattern_languages WHERE pattern_id = ?1", pattern_id)?,
        frameworks: load_frameworks(conn, pattern_id)?,
        paths: collect_strings(conn, "SELECT path FROM pattern_paths WHERE pattern_id = ?1", pattern_id)?,
        repos: collect_strings(conn, "SELECT repo FROM pattern_repos WHERE pattern_id = ?1", pattern_id)?,
        task_types: collect_strings(conn, "SELECT task_type FROM pattern_task_types WHERE pattern_id = ?1", pattern_id)?,
        envs: collect_strings(conn, "SELECT env FROM pattern_envs WHERE pattern_id = ?1", pattern_id)?,
        tags: collect_strings(conn, "SELECT tag FROM pattern_tags WHERE pattern_id = ?1", pattern_id)?,
    })
}

fn load_frameworks(conn: &Connection, pattern_id: &str) -> StorageResult<Vec<FrameworkRef>> {
    let mut stmt = conn.prepare(
        "SELECT name, range FROM pattern_frameworks WHERE pattern_id = ?1",
    )?;
    let rows = stmt.query_map(params![pattern_id], |row| {
        Ok(FrameworkRef {
            name: row.get(0)?,
            range: row.get(1)?,
        })
    })?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn load_triggers_pub(conn: &Connection, pattern_id: &str) -> StorageResult<Vec<Trigger>> {
    load_triggers(conn, pattern_id)
}

pub fn load_vocab_pub(conn: &Connection, pattern_id: &str) -> StorageResult<Vec<VocabTerm>> {
    load_vocab(conn, pattern_id)
}

fn load_triggers(conn: &Connection, pattern_id: &str) -> StorageResult<Vec<Trigger>> {
    let mut stmt = conn.prepare(
        "SELECT kind, value, is_regex FROM pattern_triggers WHERE pattern_id = ?1",
    )?;
    let rows = stmt.query_map(params![pattern_id], |row| {
        let kind: String = row.get(0)?;
        let is_regex: i32 = row.get(2)?;
        Ok(Trigger {
            kind: trigger_kind_from_str(&kind),
            value: row.get(1)?,
            is_regex: is_regex != 0,
        })
    })?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

fn load_vocab(conn: &Connection, pattern_id: &str) -> StorageResult<Vec<VocabTerm>> {
    let mut stmt = conn.prepare(
        "SELECT term, term_type, weight FROM pattern_vocab WHERE pattern_id = ?1",
    )?;
    let rows = stmt.query_map(params![pattern_id], |row| {
        let term_type: String = row.get(1)?;
        Ok(VocabTerm {
            term: row.get(0)?,
            term_type: vocab_type_from_str(&term_type),
            weight: row.get(2)?,
        })
    })?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

fn collect_strings(conn: &Connection, sql: &str, pattern_id: &str) -> StorageResult<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![pattern_id], |row| row.get::<_, String>(0))?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

fn trigger_kind_str(kind: TriggerKind) -> &'static str {
    match kind {
        TriggerKind::Error => "error",
        TriggerKind::Keyword => "keyword",
        TriggerKind::Scenario => "scenario",
        TriggerKind::FileGlob => "file_glob",
    }
}

fn trigger_kind_from_str(s: &str) -> TriggerKind {
    match s {
        "error" => TriggerKind::Error,
        "scenario" => TriggerKind::Scenario,
        "file_glob" => TriggerKind::FileGlob,
        _ => TriggerKind::Keyword,
    }
}

fn vocab_type_str(t: VocabTermType) -> &'static str {
    match t {
        VocabTermType::Synonym => "synonym",
        VocabTermType::Abbreviation => "abbreviation",
        VocabTermType::DomainTerm => "domain_term",
    }
}

fn vocab_type_from_str(s: &str) -> VocabTermType {
    match s {
        "abbreviation" => VocabTermType::Abbreviation,
        "domain_term" => VocabTermType::DomainTerm,
        _ => VocabTermType::Synonym,
    }
}
