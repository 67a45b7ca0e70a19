//! TTL cache of validation results keyed by evidence fingerprint.

use std::time::Duration;

use moka::sync::Cache;

use crate::evidence::ValidationResult;

#[derive(Clone)]
pub struct ValidationCache {
    inner: Cache<String, ValidationResult>,
}

impl ValidationCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();
        Self { inner }
    }

    pub fn get(&self, fingerprint: &str) -> Option<ValidationResult> {
        self.inner.get(fingerprint)
    }

    pub fn insert(&self, fingerprint: String, result: ValidationResult) {
        self.inner.insert(fingerprint, result);
    }
}

impl Default for ValidationCache {
    fn default() -> Self {
        Self::new(10_000, Duration::from_secs(300))
    }
}
