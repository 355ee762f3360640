//! Error types surfaced by the provisioning path.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Failure reported by a [`Resource`](super::resource::Resource) computation.
///
/// The inner error is reference counted so every coalesced waiter receives the
/// very same error instance the leader observed.
#[derive(Clone)]
pub struct ComputeError {
    inner: Arc<dyn StdError + Send + Sync + 'static>,
}

impl ComputeError {
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(error),
        }
    }

    /// Build an error from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(Message(message.into()))
    }

    /// Returns true when both handles point at the same underlying error.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }
}

impl fmt::Debug for ComputeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}

impl fmt::Display for ComputeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.inner, f)
    }
}

impl StdError for ComputeError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source()
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
struct Message(String);

/// Errors returned by [`Provisioner::provide`](super::Provisioner::provide) and
/// [`Provisioner::set`](super::Provisioner::set).
#[derive(Debug, Clone, Error)]
pub enum ProvideError {
    #[error("resource `{slug}` is not registered")]
    ResourceNotFound { slug: String },
    #[error("resource `{slug}` declares layer {layer} which is not registered")]
    LayerUndefined { slug: String, layer: usize },
    #[error("resource `{slug}` could not provide a value: {source}")]
    Computation {
        slug: String,
        #[source]
        source: ComputeError,
    },
    #[error("in-flight computation for `{key}` was abandoned before publishing a result")]
    Abandoned { key: String },
}

impl ProvideError {
    pub fn resource_not_found(slug: impl Into<String>) -> Self {
        Self::ResourceNotFound { slug: slug.into() }
    }

    pub fn layer_undefined(slug: impl Into<String>, layer: usize) -> Self {
        Self::LayerUndefined {
            slug: slug.into(),
            layer,
        }
    }

    /// The computation error, when this failure came from the resource itself.
    pub fn compute_error(&self) -> Option<&ComputeError> {
        match self {
            Self::Computation { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Errors reported by a cache tier.
#[derive(Debug, Error)]
pub enum LayerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("backend error: {message}")]
    Backend { message: String },
}

impl LayerError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("upstream unavailable")]
    struct Upstream;

    #[test]
    fn compute_error_clones_share_identity() {
        let error = ComputeError::new(Upstream);
        let cloned = error.clone();
        assert!(error.ptr_eq(&cloned));
        assert!(!error.ptr_eq(&ComputeError::new(Upstream)));
    }

    #[test]
    fn compute_error_keeps_kind() {
        let error = ComputeError::new(Upstream);
        assert!(error.downcast_ref::<Upstream>().is_some());
        assert_eq!(error.to_string(), "upstream unavailable");
    }

    #[test]
    fn provide_error_exposes_compute_source() {
        let error = ProvideError::Computation {
            slug: "getUser".to_string(),
            source: ComputeError::msg("cannot provide"),
        };
        assert_eq!(
            error.to_string(),
            "resource `getUser` could not provide a value: cannot provide"
        );
        assert!(error.compute_error().is_some());
        assert!(ProvideError::resource_not_found("x").compute_error().is_none());
    }
}
