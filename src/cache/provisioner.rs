//! Read-through provisioning: tier lookup, coalesced computation, write-through.

use std::sync::{Arc, RwLock};
use std::time::Instant;

use bytes::Bytes;
use metrics::{counter, histogram};
use tracing::{debug, info, instrument, warn};

use super::coalesce::{CoalesceError, RequestCoalescer, Role};
use super::error::{ComputeError, ProvideError};
use super::keys::{DefaultKeyGenerator, KeyGenerator, Params};
use super::layer::{CacheLayer, LayerRegistry};
use super::lock::{rw_read, rw_write};
use super::lookup::{Lookup, probe, scan};
use super::metrics::{
    METRIC_COALESCED_TOTAL, METRIC_COMPUTE_ERROR_TOTAL, METRIC_COMPUTE_MS, METRIC_COMPUTE_TOTAL,
};
use super::resource::{Resource, ResourceRegistry};
use super::write_through::{WriteReport, write_through};

const SOURCE: &str = "cache::provisioner";

type Outcome = Result<Bytes, ComputeError>;

/// Serves `(slug, params)` requests from the first tier holding the value,
/// computing it at most once per key on a miss and writing it back to every
/// tier the resource uses.
///
/// Construct one per application instance and share it behind an `Arc`.
pub struct Provisioner {
    layers: LayerRegistry,
    resources: ResourceRegistry,
    key_generator: RwLock<Arc<dyn KeyGenerator>>,
    in_flight: RequestCoalescer<Outcome>,
}

impl Provisioner {
    /// Create a provisioner using [`DefaultKeyGenerator`].
    pub fn new() -> Self {
        Self::with_key_generator(DefaultKeyGenerator::new())
    }

    pub fn with_key_generator(generator: impl KeyGenerator + 'static) -> Self {
        Self {
            layers: LayerRegistry::new(),
            resources: ResourceRegistry::new(),
            key_generator: RwLock::new(Arc::new(generator)),
            in_flight: RequestCoalescer::new(),
        }
    }

    /// Swap the key generation policy for subsequent requests.
    pub fn set_key_generator(&self, generator: impl KeyGenerator + 'static) {
        *rw_write(&self.key_generator, SOURCE, "set_key_generator") = Arc::new(generator);
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Append a tier, returning its index.
    pub fn register_layer(&self, layer: impl CacheLayer + 'static) -> usize {
        self.layers.append([Arc::new(layer) as Arc<dyn CacheLayer>])
    }

    /// Append several tiers in order, returning the index of the first one.
    pub fn register_layers<I>(&self, layers: I) -> usize
    where
        I: IntoIterator<Item = Arc<dyn CacheLayer>>,
    {
        self.layers.append(layers)
    }

    pub fn layer(&self, index: usize) -> Option<Arc<dyn CacheLayer>> {
        self.layers.resolve(index)
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Register (or replace) the resource served under `slug`.
    pub fn register_resource(&self, slug: impl Into<String>, resource: impl Resource + 'static) {
        self.register_shared_resource(slug, Arc::new(resource));
    }

    pub fn register_shared_resource(&self, slug: impl Into<String>, resource: Arc<dyn Resource>) {
        let slug = slug.into();
        if self.resources.register(slug.clone(), resource).is_some() {
            debug!(slug = %slug, "Resource re-registered");
        }
    }

    pub fn resource(&self, slug: &str) -> Option<Arc<dyn Resource>> {
        self.resources.lookup(slug)
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Number of keys with a computation currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.in_flight_count()
    }

    /// The cache key the current generator produces for `(slug, params)`.
    pub fn key_for(&self, slug: &str, params: &[String]) -> String {
        self.key_generator().generate(slug, params)
    }

    fn key_generator(&self) -> Arc<dyn KeyGenerator> {
        Arc::clone(&rw_read(&self.key_generator, SOURCE, "key_generator"))
    }

    // ========================================================================
    // Read path
    // ========================================================================

    /// Return the value for `slug` with `params`.
    ///
    /// Tiers are probed in the resource's declared order. On a miss the
    /// resource computes the value once for all concurrent callers of the same
    /// key, and a successful result is written to every declared tier before
    /// any caller returns. Computation errors are shared by all waiters and are
    /// never cached.
    #[instrument(level = "debug", skip(self, params))]
    pub async fn provide(&self, slug: &str, params: impl Into<Params>) -> Result<Bytes, ProvideError> {
        let params = params.into();
        let resource = self
            .resources
            .lookup(slug)
            .ok_or_else(|| ProvideError::resource_not_found(slug))?;
        let key = self.key_for(slug, &params);

        match probe(&self.layers, resource.as_ref(), &key).await {
            Lookup::Hit { value, .. } => return Ok(value),
            Lookup::Misconfigured { layer } => {
                warn!(slug, key = %key, layer, "Resource declares an unregistered layer");
                return Err(ProvideError::layer_undefined(slug, layer));
            }
            Lookup::Miss => {}
        }

        let (outcome, role) = self
            .in_flight
            .run(&key, || self.compute(slug, &params, &key, resource.as_ref()))
            .await
            .map_err(|error| match error {
                CoalesceError::Abandoned { key } => ProvideError::Abandoned { key },
            })?;

        if role == Role::Follower {
            counter!(METRIC_COALESCED_TOTAL).increment(1);
            debug!(slug, key = %key, "Received coalesced outcome");
        }

        outcome.map_err(|source| ProvideError::Computation {
            slug: slug.to_string(),
            source,
        })
    }

    async fn compute(
        &self,
        slug: &str,
        params: &[String],
        key: &str,
        resource: &dyn Resource,
    ) -> Outcome {
        // A previous leader may have finished between our probe and taking the lead.
        if let Lookup::Hit { layer, value } = scan(&self.layers, resource, key).await {
            debug!(slug, key, layer, "Value stored while acquiring lead; skipping computation");
            return Ok(value);
        }

        counter!(METRIC_COMPUTE_TOTAL).increment(1);
        let started_at = Instant::now();
        let outcome = resource.compute_value(slug, params).await;
        let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;
        histogram!(METRIC_COMPUTE_MS).record(elapsed_ms);

        match &outcome {
            Ok(value) => {
                info!(slug, key, bytes = value.len(), elapsed_ms, "Resource computed value");
                let report = write_through(&self.layers, resource, key, value).await;
                if !report.is_complete() {
                    warn!(
                        slug,
                        key,
                        written = report.written.len(),
                        skipped = report.skipped.len(),
                        failed = report.failed.len(),
                        "Write-through incomplete; serving computed value"
                    );
                }
            }
            Err(error) => {
                counter!(METRIC_COMPUTE_ERROR_TOTAL).increment(1);
                warn!(slug, key, error = %error, elapsed_ms, "Resource computation failed");
            }
        }

        outcome
    }

    // ========================================================================
    // Write path
    // ========================================================================

    /// Overwrite the cached value for `(slug, params)` in every declared tier,
    /// bypassing computation.
    #[instrument(level = "debug", skip(self, value, params))]
    pub async fn set(
        &self,
        value: impl Into<Bytes>,
        slug: &str,
        params: impl Into<Params>,
    ) -> Result<WriteReport, ProvideError> {
        let value = value.into();
        let params = params.into();
        let resource = self
            .resources
            .lookup(slug)
            .ok_or_else(|| ProvideError::resource_not_found(slug))?;
        let key = self.key_for(slug, &params);

        Ok(write_through(&self.layers, resource.as_ref(), &key, &value).await)
    }
}

impl Default for Provisioner {
    fn default() -> Self {
        Self::new()
    }
}
