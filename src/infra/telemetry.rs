use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::cache::metrics::{
    METRIC_COALESCED_TOTAL, METRIC_COMPUTE_ERROR_TOTAL, METRIC_COMPUTE_MS, METRIC_COMPUTE_TOTAL,
    METRIC_LOOKUP_HIT_TOTAL, METRIC_LOOKUP_MISS_TOTAL, METRIC_WRITE_THROUGH_FAILURE_TOTAL,
};
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

/// Register descriptions for every metric the provisioning path emits.
///
/// Safe to call repeatedly; only the first call reaches the recorder.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_LOOKUP_HIT_TOTAL,
            Unit::Count,
            "Total number of lookups answered by a tier, labelled by tier index."
        );
        describe_counter!(
            METRIC_LOOKUP_MISS_TOTAL,
            Unit::Count,
            "Total number of lookups that missed every declared tier."
        );
        describe_counter!(
            METRIC_COMPUTE_TOTAL,
            Unit::Count,
            "Total number of resource computations started."
        );
        describe_counter!(
            METRIC_COMPUTE_ERROR_TOTAL,
            Unit::Count,
            "Total number of resource computations that failed."
        );
        describe_counter!(
            METRIC_COALESCED_TOTAL,
            Unit::Count,
            "Total number of requests that joined an in-flight computation."
        );
        describe_counter!(
            METRIC_WRITE_THROUGH_FAILURE_TOTAL,
            Unit::Count,
            "Total number of tier writes that failed after a computation."
        );
        describe_histogram!(
            METRIC_COMPUTE_MS,
            Unit::Milliseconds,
            "Resource computation latency in milliseconds."
        );
    });
}
