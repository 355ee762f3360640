//! Cache tiers and the ordered layer registry.
//!
//! A tier's position in the registry is its index; earlier tiers have higher
//! priority during lookup.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;

use super::error::LayerError;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::layer";

/// Uniform get/set capability over byte payloads.
///
/// Tiers own their eviction, TTL, transport and storage format. `get` returns
/// `Ok(None)` on a miss.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, LayerError>;

    async fn set(&self, key: &str, value: Bytes) -> Result<(), LayerError>;

    /// Short label used in logs and metrics.
    fn name(&self) -> &str {
        "layer"
    }
}

/// Append-only, priority-ordered list of tiers.
pub struct LayerRegistry {
    layers: RwLock<Vec<Arc<dyn CacheLayer>>>,
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self {
            layers: RwLock::new(Vec::new()),
        }
    }

    /// Append tiers to the end of the list, returning the index of the first one.
    pub fn append<I>(&self, layers: I) -> usize
    where
        I: IntoIterator<Item = Arc<dyn CacheLayer>>,
    {
        let mut guard = rw_write(&self.layers, SOURCE, "append");
        let first = guard.len();
        guard.extend(layers);
        first
    }

    /// The tier registered at `index`, if any.
    ///
    /// The returned handle is detached from the registry lock, so callers may
    /// await tier I/O on it freely.
    pub fn resolve(&self, index: usize) -> Option<Arc<dyn CacheLayer>> {
        rw_read(&self.layers, SOURCE, "resolve").get(index).cloned()
    }

    pub fn len(&self) -> usize {
        rw_read(&self.layers, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LayerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;
    use crate::layers::ShardedLayer;

    fn layer() -> Arc<dyn CacheLayer> {
        Arc::new(ShardedLayer::new())
    }

    #[test]
    fn append_preserves_order() {
        let registry = LayerRegistry::new();
        let first = layer();
        let second = layer();

        assert_eq!(registry.append([Arc::clone(&first)]), 0);
        assert_eq!(registry.append([Arc::clone(&second), layer()]), 1);
        assert_eq!(registry.len(), 3);

        let resolved = registry.resolve(0).expect("layer 0");
        assert!(Arc::ptr_eq(&resolved, &first));
        let resolved = registry.resolve(1).expect("layer 1");
        assert!(Arc::ptr_eq(&resolved, &second));
    }

    #[test]
    fn resolve_out_of_range_is_none() {
        let registry = LayerRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.resolve(0).is_none());

        registry.append([layer()]);
        assert!(registry.resolve(1).is_none());
    }

    #[test]
    fn registry_recovers_from_poisoned_lock() {
        let registry = LayerRegistry::new();

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = registry
                .layers
                .write()
                .expect("layers lock should be acquired");
            panic!("poison layers lock");
        }));

        registry.append([layer()]);
        assert!(registry.resolve(0).is_some());
    }
}
