//! Best-effort write-through into every tier a resource declares.

use bytes::Bytes;
use metrics::counter;
use tracing::{debug, warn};

use super::error::LayerError;
use super::layer::LayerRegistry;
use super::metrics::METRIC_WRITE_THROUGH_FAILURE_TOTAL;
use super::resource::Resource;

/// What happened to each declared tier during a write-through.
#[derive(Debug, Default)]
pub struct WriteReport {
    /// Tier indices that accepted the value.
    pub written: Vec<usize>,
    /// Declared indices that did not resolve to a registered tier.
    pub skipped: Vec<usize>,
    /// Tiers whose `set` failed.
    pub failed: Vec<(usize, LayerError)>,
}

impl WriteReport {
    /// True when every declared tier accepted the value.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty() && self.failed.is_empty()
    }
}

/// Store `value` under `key` in every tier declared by `resource`.
///
/// Unresolvable indices are skipped and failing tiers do not stop the remaining
/// ones. Failures are logged and counted; callers decide whether the report
/// matters to them.
pub async fn write_through(
    layers: &LayerRegistry,
    resource: &dyn Resource,
    key: &str,
    value: &Bytes,
) -> WriteReport {
    let mut report = WriteReport::default();

    for &index in resource.layers() {
        let Some(layer) = layers.resolve(index) else {
            warn!(key, layer = index, "Write-through skipped unregistered layer");
            report.skipped.push(index);
            continue;
        };

        match layer.set(key, value.clone()).await {
            Ok(()) => {
                debug!(key, layer = index, bytes = value.len(), "Write-through stored value");
                report.written.push(index);
            }
            Err(error) => {
                warn!(
                    key,
                    layer = index,
                    layer_name = layer.name(),
                    error = %error,
                    "Write-through failed for layer"
                );
                counter!(METRIC_WRITE_THROUGH_FAILURE_TOTAL, "layer" => index.to_string())
                    .increment(1);
                report.failed.push((index, error));
            }
        }
    }

    report
}
