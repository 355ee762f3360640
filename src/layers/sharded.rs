use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::cache::{CacheLayer, LayerError};

/// Unbounded concurrent map tier. Entries live until overwritten.
#[derive(Default)]
pub struct ShardedLayer {
    entries: DashMap<String, Bytes>,
}

impl ShardedLayer {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheLayer for ShardedLayer {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, LayerError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<(), LayerError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn name(&self) -> &str {
        "sharded"
    }
}
