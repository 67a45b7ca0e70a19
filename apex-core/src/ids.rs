//! Pattern identifiers: colon-segmented, 2–4 segments, `[A-Z0-9][A-Z0-9._-]*` each.

use std::fmt;
use std::sync::OnceLock;

use rand::Rng;
use regex::Regex;

use crate::error::{CoreError, CoreResult};

const MIN_SEGMENTS: usize = 2;
const MAX_SEGMENTS: usize = 4;

fn segment_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z0-9][A-Z0-9._-]*$").expect("static regex is valid"))
}

/// A validated pattern identifier, e.g. `APEX.SYSTEM:PAT:AUTO:a1b2c3d4`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PatternId(String);

impl PatternId {
    /// Parse and validate a raw string into a `PatternId`.
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let segments: Vec<&str> = raw.split(':').collect();
        if segments.len() < MIN_SEGMENTS || segments.len() > MAX_SEGMENTS {
            return Err(CoreError::InvalidPatternId {
                id: raw.to_string(),
                reason: format!(
                    "expected {MIN_SEGMENTS}-{MAX_SEGMENTS} colon-separated segments, found {}",
                    segments.len()
                ),
            });
        }
        for seg in &segments {
            if !is_valid_segment(seg) {
                return Err(CoreError::InvalidPatternId {
                    id: raw.to_string(),
                    reason: format!("segment `{seg}` must match [A-Z0-9][A-Z0-9._-]*"),
                });
            }
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> Vec<&str> {
        self.0.split(':').collect()
    }

    /// The leading namespace/org segment, used for same-org locality checks (§4.6).
    pub fn namespace(&self) -> &str {
        self.0.split(':').next().unwrap_or(&self.0)
    }

    /// The org prefix before the first `.` in the namespace segment, if any.
    pub fn org_prefix(&self) -> &str {
        let ns = self.namespace();
        ns.split('.').next().unwrap_or(ns)
    }

    /// Allocate a fresh auto-generated ID for a CODEBASE (non-anti) pattern.
    pub fn new_auto_codebase() -> Self {
        Self(format!("APEX.SYSTEM:PAT:AUTO:{}", random_suffix(8)))
    }

    /// Allocate a fresh auto-generated ID for an anti-pattern.
    pub fn new_auto_anti() -> Self {
        Self(format!("APEX.SYSTEM:ANTI:AUTO:{}", random_suffix(8)))
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PatternId {
    type Error = CoreError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PatternId> for String {
    fn from(value: PatternId) -> Self {
        value.0
    }
}

fn is_valid_segment(seg: &str) -> bool {
    segment_pattern().is_match(seg)
}

fn random_suffix(len: usize) -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Opaque, URL-safe random task identifier.
pub fn new_task_id() -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    (0..21)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_two_to_four_segments() {
        assert!(PatternId::parse("TEST:PATTERN").is_ok());
        assert!(PatternId::parse("APEX.SYSTEM:PAT:AUTO:a1b2c3d4").is_ok());
    }

    #[test]
    fn rejects_single_segment() {
        assert!(PatternId::parse("TEST").is_err());
    }

    #[test]
    fn rejects_too_many_segments() {
        assert!(PatternId::parse("A:B:C:D:E").is_err());
    }

    #[test]
    fn rejects_lowercase_leading_char() {
        assert!(PatternId::parse("test:pattern").is_err());
    }

    #[test]
    fn org_prefix_splits_on_dot() {
        let id = PatternId::parse("APEX.SYSTEM:PAT:AUTO:a1b2c3d4").unwrap();
        assert_eq!(id.org_prefix(), "APEX");
        assert_eq!(id.namespace(), "APEX.SYSTEM");
    }

    #[test]
    fn auto_ids_are_well_formed() {
        let id = PatternId::new_auto_codebase();
        assert!(PatternId::parse(id.as_str()).is_ok());
        assert!(id.as_str().starts_with("APEX.SYSTEM:PAT:AUTO:"));
    }
}
