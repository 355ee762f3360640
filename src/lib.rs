//! Multi-tier read-through cache orchestration.
//!
//! See [`cache::Provisioner`] for the request path and [`layers`] for the
//! bundled tiers.

pub mod cache;
pub mod config;
pub mod error;
pub mod infra;
pub mod layers;

pub use cache::{
    CacheLayer, ComputeError, DefaultKeyGenerator, FnResource, KeyGenerator, LayerError, Params,
    ProvideError, Provisioner, Resource, WriteReport,
};
