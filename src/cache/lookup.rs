//! Priority-ordered tier probing.

use bytes::Bytes;
use metrics::counter;
use tracing::debug;

use super::layer::LayerRegistry;
use super::metrics::{METRIC_LOOKUP_HIT_TOTAL, METRIC_LOOKUP_MISS_TOTAL};
use super::resource::Resource;

/// Result of probing a resource's tiers for a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The first tier (in declared order) that held the key.
    Hit { layer: usize, value: Bytes },
    /// No declared tier held the key.
    Miss,
    /// The resource declares a tier index the registry cannot resolve.
    Misconfigured { layer: usize },
}

/// Probe the tiers declared by `resource` sequentially, first hit wins.
///
/// A tier whose `get` fails is treated as a miss for that tier and the probe
/// moves on. An unresolvable index stops the probe immediately.
pub async fn probe(layers: &LayerRegistry, resource: &dyn Resource, key: &str) -> Lookup {
    let lookup = scan(layers, resource, key).await;
    match &lookup {
        Lookup::Hit { layer, .. } => {
            counter!(METRIC_LOOKUP_HIT_TOTAL, "layer" => layer.to_string()).increment(1);
        }
        Lookup::Miss => {
            debug!(key, "Cache miss on all layers");
            counter!(METRIC_LOOKUP_MISS_TOTAL).increment(1);
        }
        Lookup::Misconfigured { .. } => {}
    }
    lookup
}

/// Same walk as [`probe`] without touching the lookup counters.
pub(crate) async fn scan(layers: &LayerRegistry, resource: &dyn Resource, key: &str) -> Lookup {
    for &index in resource.layers() {
        let Some(layer) = layers.resolve(index) else {
            return Lookup::Misconfigured { layer: index };
        };

        match layer.get(key).await {
            Ok(Some(value)) => {
                debug!(key, layer = index, layer_name = layer.name(), "Cache hit");
                return Lookup::Hit {
                    layer: index,
                    value,
                };
            }
            Ok(None) => {}
            Err(error) => {
                debug!(
                    key,
                    layer = index,
                    layer_name = layer.name(),
                    error = %error,
                    "Cache layer read failed; treating as miss"
                );
            }
        }
    }

    Lookup::Miss
}
