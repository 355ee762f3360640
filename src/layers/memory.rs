use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use tracing::trace;

use crate::cache::lock::mutex_lock;
use crate::cache::{CacheLayer, LayerError};

const SOURCE: &str = "layers::memory";

struct Entry {
    value: Bytes,
    expires_at: Option<Instant>,
}

/// Bounded in-process LRU tier.
///
/// Capacity is clamped to at least one entry. With a TTL, entries older than
/// the TTL read as misses and are dropped on access.
pub struct MemoryLayer {
    entries: Mutex<LruCache<String, Entry>>,
    ttl: Option<Duration>,
}

impl MemoryLayer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(capacity, None)
    }

    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn capacity(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "capacity").cap().get()
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheLayer for MemoryLayer {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, LayerError> {
        let mut entries = mutex_lock(&self.entries, SOURCE, "get");
        let Some(entry) = entries.get(key) else {
            return Ok(None);
        };

        if entry
            .expires_at
            .is_some_and(|deadline| deadline <= Instant::now())
        {
            trace!(key, "Memory layer entry expired");
            entries.pop(key);
            return Ok(None);
        }
        Ok(Some(entry.value.clone()))
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<(), LayerError> {
        // A TTL past the clock's range never expires.
        let expires_at = self.ttl.and_then(|ttl| Instant::now().checked_add(ttl));
        let evicted = mutex_lock(&self.entries, SOURCE, "set")
            .push(key.to_string(), Entry { value, expires_at })
            .filter(|(evicted_key, _)| evicted_key != key);
        if let Some((evicted_key, _)) = evicted {
            trace!(key, evicted_key = %evicted_key, "Memory layer evicted least recently used entry");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
