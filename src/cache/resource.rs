//! Resources and the slug-keyed resource registry.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;

use super::error::ComputeError;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::resource";

/// A named data source that can compute a value when no tier holds it.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Tier indices this resource reads from and writes to, in priority order.
    fn layers(&self) -> &[usize];

    async fn compute_value(&self, slug: &str, params: &[String]) -> Result<Bytes, ComputeError>;
}

/// Adapts an async closure into a [`Resource`].
///
/// ```ignore
/// let resource = FnResource::new([0, 1], |slug, params| async move {
///     Ok(Bytes::from(format!("{slug}:{}", params.join("-"))))
/// });
/// ```
pub struct FnResource<F> {
    layers: Vec<usize>,
    compute: F,
}

impl<F, Fut> FnResource<F>
where
    F: Fn(String, Vec<String>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Bytes, ComputeError>> + Send + 'static,
{
    pub fn new(layers: impl IntoIterator<Item = usize>, compute: F) -> Self {
        Self {
            layers: layers.into_iter().collect(),
            compute,
        }
    }
}

#[async_trait]
impl<F, Fut> Resource for FnResource<F>
where
    F: Fn(String, Vec<String>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Bytes, ComputeError>> + Send + 'static,
{
    fn layers(&self) -> &[usize] {
        &self.layers
    }

    async fn compute_value(&self, slug: &str, params: &[String]) -> Result<Bytes, ComputeError> {
        (self.compute)(slug.to_string(), params.to_vec()).await
    }
}

/// Thread-safe map from slug to resource. Re-registration overwrites.
pub struct ResourceRegistry {
    resources: RwLock<HashMap<String, Arc<dyn Resource>>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self {
            resources: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or replace the resource registered under `slug`.
    ///
    /// Returns the previously registered resource, if any.
    pub fn register(
        &self,
        slug: impl Into<String>,
        resource: Arc<dyn Resource>,
    ) -> Option<Arc<dyn Resource>> {
        rw_write(&self.resources, SOURCE, "register").insert(slug.into(), resource)
    }

    pub fn lookup(&self, slug: &str) -> Option<Arc<dyn Resource>> {
        rw_read(&self.resources, SOURCE, "lookup").get(slug).cloned()
    }

    pub fn len(&self) -> usize {
        rw_read(&self.resources, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
