//! Cache metadata pass-through.
//!
//! Result caching itself belongs to an external collaborator; the core only
//! attaches whether a response came from a cache and how old it is, plus the
//! compiled-query fingerprint external caches key on.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Attached to every query response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub cache_hit: bool,
    /// Age of the cached result, when `cache_hit` is true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_age_seconds: Option<u64>,
    /// Fingerprint of the compiled query; same explore + same query + same
    /// dialect always produce the same fingerprint.
    pub fingerprint: String,
}

impl CacheMetadata {
    pub fn miss(fingerprint: &str) -> Self {
        Self {
            cache_hit: false,
            cache_age_seconds: None,
            fingerprint: fingerprint.to_string(),
        }
    }

    pub fn hit(fingerprint: &str, age: Duration) -> Self {
        Self {
            cache_hit: true,
            cache_age_seconds: Some(age.as_secs()),
            fingerprint: fingerprint.to_string(),
        }
    }
}
