//! Build cache tiers from resolved settings.

use std::sync::Arc;

use tracing::info;

use crate::cache::CacheLayer;
use crate::config::TierSettings;
use crate::layers::{DirectoryLayer, MemoryLayer, ShardedLayer};

use super::error::InfraError;

/// Instantiate one tier per entry, preserving order so that the position in
/// `tiers` becomes the registered tier index.
pub fn build_layers(tiers: &[TierSettings]) -> Result<Vec<Arc<dyn CacheLayer>>, InfraError> {
    tiers
        .iter()
        .enumerate()
        .map(|(index, tier)| build_layer(index, tier))
        .collect()
}

fn build_layer(index: usize, tier: &TierSettings) -> Result<Arc<dyn CacheLayer>, InfraError> {
    let layer: Arc<dyn CacheLayer> = match tier {
        TierSettings::Memory { capacity, ttl } => {
            info!(tier = index, capacity = capacity.get(), ttl = ?ttl, "Opening memory tier");
            Arc::new(MemoryLayer::new(capacity.get(), *ttl))
        }
        TierSettings::Sharded => {
            info!(tier = index, "Opening sharded tier");
            Arc::new(ShardedLayer::new())
        }
        TierSettings::Directory { path } => {
            info!(tier = index, path = %path.display(), "Opening directory tier");
            let layer = DirectoryLayer::new(path)
                .map_err(|err| InfraError::tier(index, path, err))?;
            Arc::new(layer)
        }
    };
    Ok(layer)
}
