//! Metric names emitted by the provisioning path.
//!
//! Descriptions are registered once by `infra::telemetry`.

pub const METRIC_LOOKUP_HIT_TOTAL: &str = "tiercache_lookup_hit_total";
pub const METRIC_LOOKUP_MISS_TOTAL: &str = "tiercache_lookup_miss_total";
pub const METRIC_COMPUTE_TOTAL: &str = "tiercache_compute_total";
pub const METRIC_COMPUTE_ERROR_TOTAL: &str = "tiercache_compute_error_total";
pub const METRIC_COMPUTE_MS: &str = "tiercache_compute_ms";
pub const METRIC_COALESCED_TOTAL: &str = "tiercache_coalesced_total";
pub const METRIC_WRITE_THROUGH_FAILURE_TOTAL: &str = "tiercache_write_through_failure_total";
