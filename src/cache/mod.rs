//! Read-through cache orchestration.
//!
//! A [`Provisioner`] answers "value for resource `slug` with `params`":
//!
//! - **Lookup**: probe the resource's tiers in declared priority order, first
//!   hit wins
//! - **Coalescing**: on a miss, concurrent callers for the same key share one
//!   computation
//! - **Write-through**: a computed value is stored in every declared tier
//!
//! ## Usage
//!
//! ```ignore
//! let provisioner = Provisioner::new();
//! provisioner.register_layer(MemoryLayer::with_capacity(1_000));
//! provisioner.register_resource("getUser", FnResource::new([0], fetch_user));
//!
//! let bytes = provisioner.provide("getUser", ["2", "3"]).await?;
//! ```

mod coalesce;
mod error;
mod keys;
mod layer;
pub(crate) mod lock;
mod lookup;
pub mod metrics;
mod provisioner;
mod resource;
mod write_through;

pub use coalesce::{CoalesceError, RequestCoalescer, Role};
pub use error::{ComputeError, LayerError, ProvideError};
pub use keys::{DEFAULT_SEPARATOR, DefaultKeyGenerator, KeyGenerator, Params};
pub use layer::{CacheLayer, LayerRegistry};
pub use lookup::{Lookup, probe};
pub use provisioner::Provisioner;
pub use resource::{FnResource, Resource, ResourceRegistry};
pub use write_through::{WriteReport, write_through};
