//! Snippet normalisation and hashing (spec.md §4.4).
//!
//! Trim trailing whitespace per line, collapse runs of blank lines to a
//! single blank line, preserve indentation. Hash is SHA-256 of the
//! normalised UTF-8 bytes.

use sha2::{Digest, Sha256};

pub fn normalize(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut blank_run = false;
    for line in content.lines() {
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            if blank_run {
                continue;
            }
            blank_run = true;
        } else {
            blank_run = false;
        }
        out.push_str(trimmed);
        out.push('\n');
    }
    out
}

pub fn hash_normalized(content: &str) -> String {
    let normalized = normalize(content);
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

pub fn extract_lines(content: &str, start: u32, end: u32) -> Option<String> {
    if start == 0 || end < start {
        return None;
    }
    let lines: Vec<&str> = content.lines().collect();
    let start_idx = (start - 1) as usize;
    let end_idx = end as usize;
    if start_idx >= lines.len() {
        return None;
    }
    let end_idx = end_idx.min(lines.len());
    Some(lines[start_idx..end_idx].join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_trailing_whitespace() {
        assert_eq!(normalize("foo   \nbar\t\n"), "foo\nbar\n");
    }

    #[test]
    fn normalize_collapses_blank_runs() {
        assert_eq!(normalize("a\n\n\n\nb\n"), "a\n\nb\n");
    }

    #[test]
    fn extract_lines_is_one_indexed_inclusive() {
        let content = "a\nb\nc\nd\n";
        assert_eq!(extract_lines(content, 2, 3).unwrap(), "b\nc");
    }

    #[test]
    fn hash_is_stable_across_trivial_whitespace_differences() {
        let a = hash_normalized("foo  \nbar\n");
        let b = hash_normalized("foo\nbar \n");
        assert_eq!(a, b);
    }
}
