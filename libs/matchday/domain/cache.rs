use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Request parameters, always iterated in sorted key order
pub type QueryParams = BTreeMap<String, String>;

/// Deterministic cache key for an upstream request.
///
/// Identical logical requests hash identically regardless of the order in
/// which the caller supplied the parameters. Every key and value is
/// length-prefixed, so separators inside values cannot collide with a
/// different parameter set.
pub fn cache_key(endpoint: &str, params: &QueryParams) -> String {
    let mut hasher = Sha256::new();
    hasher.update(endpoint.trim_matches('/').as_bytes());
    hasher.update(b"?");
    for (name, value) in params {
        hash_field(&mut hasher, name);
        hash_field(&mut hasher, value);
    }
    hex::encode(hasher.finalize())
}

fn hash_field(hasher: &mut Sha256, field: &str) {
    hasher.update((field.len() as u64).to_be_bytes());
    hasher.update(field.as_bytes());
}

/// Cached upstream response with expiry metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub endpoint: String,
    pub parameters: QueryParams,
    pub response: serde_json::Value,
    pub has_data: bool,
    pub is_error: bool,
    pub ttl_seconds: i64,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Build an entry whose expiry is exactly `cached_at + ttl_seconds`
    pub fn new(
        endpoint: &str,
        parameters: QueryParams,
        response: serde_json::Value,
        has_data: bool,
        is_error: bool,
        ttl_seconds: i64,
        cached_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key: cache_key(endpoint, &parameters),
            endpoint: endpoint.trim_matches('/').to_string(),
            parameters,
            response,
            has_data,
            is_error,
            ttl_seconds,
            cached_at,
            expires_at: cached_at + Duration::seconds(ttl_seconds),
        }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Remaining lifetime in whole seconds, zero once expired
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}
