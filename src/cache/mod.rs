//! In-process key/value cache with optional per-entry expiry.
//!
//! Expiry is lazy: an expired entry stays in the map until a `get` touches
//! it, at which point it is evicted. There is no background sweep and no
//! size bound.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// Thread-safe TTL cache shared behind an `Arc`.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
}

impl<K, V> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + std::fmt::Debug,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value`, expiring `ttl` after now. `None` never expires.
    pub fn set(&self, key: K, value: V, ttl: Option<Duration>) {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        debug!(key = ?key, ttl_ms = ttl.map(|t| t.as_millis() as u64), "Cache entry set");
        self.lock().insert(key, CacheEntry { value, expires_at });
    }

    /// Return the live value for `key`, evicting it if it has expired.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + std::fmt::Debug + ?Sized,
    {
        let mut entries = self.lock();
        let expired = entries.get(key)?.is_expired(Instant::now());

        if expired {
            entries.remove(key);
            debug!(key = ?key, "Cache entry expired");
            return None;
        }

        entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn delete<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Eq + Hash + std::fmt::Debug + ?Sized,
    {
        if self.lock().remove(key).is_some() {
            debug!(key = ?key, "Cache entry deleted");
        }
    }

    pub fn clear(&self) {
        self.lock().clear();
        debug!("Cache cleared");
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn size(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, CacheEntry<V>>> {
        // A panic while holding the lock cannot leave a half-written entry.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
