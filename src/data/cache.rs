//! In-memory profile cache
//!
//! Volatile and cleared on restart. Staleness is checked lazily on read;
//! `prune_expired` only exists to keep memory bounded.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::models::{CacheKey, ProfileRecord};
use crate::metrics::{CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL, CACHE_SIZE};

/// Cached profile entry
///
/// Replaced wholesale on every successful fetch, never mutated in place.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: ProfileRecord,
    inserted_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() < ttl
    }
}

/// TTL cache keyed by normalized handle
pub struct ProfileCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
}

impl ProfileCache {
    /// Create new profile cache
    ///
    /// # Arguments
    /// * `ttl` - Age at which an entry stops being served
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Get a fresh profile, or `None` on miss or expiry
    pub async fn get(&self, key: &CacheKey) -> Option<ProfileRecord> {
        let entries = self.entries.read().await;
        let result = entries
            .get(key)
            .filter(|entry| entry.is_fresh(self.ttl))
            .map(|entry| entry.value.clone());

        if result.is_some() {
            CACHE_HITS_TOTAL.with_label_values(&["profile"]).inc();
        } else {
            if entries.contains_key(key) {
                tracing::debug!(key = %key, "Profile cache entry expired");
            }
            CACHE_MISSES_TOTAL.with_label_values(&["profile"]).inc();
        }

        result
    }

    /// Insert or replace a profile. Last writer wins.
    pub async fn set(&self, key: CacheKey, value: ProfileRecord) {
        self.set_fetched_at(key, value, Instant::now()).await;
    }

    /// Insert or replace a profile whose upstream call started at `fetched_at`
    ///
    /// Age is counted from the start of the call, so a slow fetch does not
    /// extend how long its data is served.
    pub async fn set_fetched_at(&self, key: CacheKey, value: ProfileRecord, fetched_at: Instant) {
        let mut entries = self.entries.write().await;
        tracing::debug!(key = %key, "Profile cached");
        entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: fetched_at,
            },
        );

        CACHE_SIZE
            .with_label_values(&["profile"])
            .set(entries.len() as i64);
    }

    /// Drop entries older than the TTL
    ///
    /// Returns the number of removed entries.
    pub async fn prune_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(self.ttl));
        let removed = before - entries.len();

        CACHE_SIZE
            .with_label_values(&["profile"])
            .set(entries.len() as i64);

        if removed > 0 {
            tracing::info!("Pruned {} expired profile cache entries", removed);
        }
        removed
    }
}
