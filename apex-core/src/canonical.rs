//! Canonical JSON and content-addressed digests.
//!
//! `serde_json::Map` is backed by a `BTreeMap` unless the `preserve_order`
//! feature is enabled (it is not, anywhere in this workspace), so object
//! keys already serialise in sorted order. Canonicalisation therefore
//! reduces to: serialize through `serde_json::Value` (which normalises key
//! order and drops insignificant whitespace) and hash the resulting bytes.

use sha2::{Digest, Sha256};

use crate::error::{CoreError, CoreResult};

/// Produce canonical JSON bytes for any serializable value: sorted keys,
/// no insignificant whitespace, arrays preserve insertion order.
pub fn canonical_json<T: serde::Serialize>(value: &T) -> CoreResult<Vec<u8>> {
    let as_value = serde_json::to_value(value).map_err(CoreError::Canonicalisation)?;
    serde_json::to_vec(&as_value).map_err(CoreError::Canonicalisation)
}

/// SHA-256 of the canonical JSON bytes, as lowercase hex.
pub fn digest_of(canonical: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical);
    hex::encode(hasher.finalize())
}

/// Convenience: canonicalise then digest in one step.
pub fn canonicalise_and_digest<T: serde::Serialize>(value: &T) -> CoreResult<(Vec<u8>, String)> {
    let bytes = canonical_json(value)?;
    let digest = digest_of(&bytes);
    Ok((bytes, digest))
}

// Minimal hex encoder so we don't pull in a dedicated `hex` crate for one call site.
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        use std::fmt::Write;
        let mut out = String::with_capacity(bytes.as_ref().len() * 2);
        for byte in bytes.as_ref() {
            let _ = write!(out, "{byte:02x}");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_json_sorts_keys() {
        let v = json!({"b": 1, "a": 2});
        let bytes = canonical_json(&v).unwrap();
        let s = String::from_utf8(bytes).unwrap();
        assert_eq!(s, r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn canonicalisation_is_idempotent() {
        let v = json!({"z": [3, 1, 2], "a": {"d": 1, "c": 2}});
        let once = canonical_json(&v).unwrap();
        let twice_value: serde_json::Value = serde_json::from_slice(&once).unwrap();
        let twice = canonical_json(&twice_value).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn digest_matches_sha256_of_canonical_bytes() {
        let v = json!({"a": 1});
        let (bytes, digest) = canonicalise_and_digest(&v).unwrap();
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        assert_eq!(digest, hex::encode(hasher.finalize()));
    }
}
