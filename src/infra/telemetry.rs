use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::cache::{CACHE_EVICT_TOTAL, CACHE_EXPIRED_TOTAL, CACHE_HIT_TOTAL, CACHE_MISS_TOTAL};
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

pub const HTTP_REQUEST_DURATION_MS: &str = "scribbly_http_request_duration_ms";

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
            InfraError::Telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            CACHE_HIT_TOTAL,
            Unit::Count,
            "Index page requests answered from the response cache."
        );
        describe_counter!(
            CACHE_MISS_TOTAL,
            Unit::Count,
            "Index page requests that had to be rendered."
        );
        describe_counter!(
            CACHE_EXPIRED_TOTAL,
            Unit::Count,
            "Cached index pages dropped because their TTL elapsed."
        );
        describe_counter!(
            CACHE_EVICT_TOTAL,
            Unit::Count,
            "Cached index pages evicted to stay within capacity."
        );
        describe_histogram!(
            HTTP_REQUEST_DURATION_MS,
            Unit::Milliseconds,
            "Time spent producing an HTTP response."
        );
    });
}
