use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing::Subscriber;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, Layer, fmt, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

/// Counters the survey services emit, with their descriptions.
const COUNTERS: [(&str, &str); 5] = [
    (
        "surveyor_surveys_created_total",
        "Surveys created, each with its first page.",
    ),
    (
        "surveyor_surveys_duplicated_total",
        "Surveys copied together with their pages, fields and choices.",
    ),
    (
        "surveyor_answers_saved_total",
        "Field answers written; resubmitting a field counts again.",
    ),
    (
        "surveyor_flow_resolutions_total",
        "Next-page resolutions labelled by outcome (page, complete, cycle).",
    ),
    (
        "surveyor_mappings_applied_total",
        "Canonical labels applied to free-text answers.",
    ),
];

static DESCRIBED: Once = Once::new();

/// Install the global subscriber and register metric descriptions.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(ErrorLayer::default())
        .with(output_layer(logging.format))
        .try_init()
        .map_err(|err| InfraError::Telemetry(err.to_string()))
}

fn output_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    }
}

fn describe_metrics() {
    DESCRIBED.call_once(|| {
        for (name, description) in COUNTERS {
            describe_counter!(name, Unit::Count, description);
        }
    });
}
