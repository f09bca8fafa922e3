//! Response cache contract for source adapters.
//!
//! Adapters that talk to slow or rate-limited upstreams may keep raw
//! responses in a [`Cache`]. The engine never touches the cache itself; it
//! only reports whether an adapter answered from it. Stale-read tolerance
//! is the backend's responsibility.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;

/// Key/value store with optional per-entry time-to-live.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Returns the live value for `key`, if any.
    async fn get(&self, key: &str) -> Option<serde_json::Value>;

    /// Stores `value` under `key`. `None` falls back to the backend's
    /// default TTL.
    async fn set(&self, key: &str, value: serde_json::Value, ttl: Option<Duration>);

    /// Removes `key`, returning `true` if a live value was present.
    async fn delete(&self, key: &str) -> bool;

    /// Returns `true` if a live value exists for `key`.
    async fn has(&self, key: &str) -> bool;
}

struct CachedValue {
    value: serde_json::Value,
    expires_at: Option<Instant>,
}

impl CachedValue {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// In-process [`Cache`] backed by a map. Expired entries are evicted lazily
/// on access.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<BTreeMap<String, CachedValue>>,
    default_ttl: Option<Duration>,
}

impl MemoryCache {
    /// Creates a cache whose entries never expire unless a TTL is given.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache that applies `ttl` to entries stored without one.
    #[must_use]
    pub fn with_default_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::default(),
            default_ttl: Some(ttl),
        }
    }

    fn lookup(&self, key: &str) -> Option<serde_json::Value> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        match entries.get(key) {
            Some(cached) if cached.is_live(now) => Some(cached.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.lookup(key)
    }

    async fn set(&self, key: &str, value: serde_json::Value, ttl: Option<Duration>) {
        let expires_at = ttl
            .or(self.default_ttl)
            .map(|ttl| Instant::now() + ttl);

        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), CachedValue { value, expires_at });
    }

    async fn delete(&self, key: &str) -> bool {
        let removed = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        removed.is_some_and(|cached| cached.is_live(Instant::now()))
    }

    async fn has(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }
}
