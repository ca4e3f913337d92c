use std::io::{self, IsTerminal};
use std::sync::OnceLock;
use std::time::Duration;

use bon::Builder;
use indicatif::ProgressStyle;
use opentelemetry::global;
use opentelemetry::trace::TracerProvider as _;
use tracing::Metadata;
use tracing::level_filters::LevelFilter;
use tracing_indicatif::{IndicatifLayer, TickSettings};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::filter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::TelemetryError;

/// Filter used when neither `--log-level` nor `RUST_LOG` is given.
const DEFAULT_DIRECTIVE: &str = "warn";

/// Span targets that get a progress line on an interactive terminal.
const PROGRESS_TARGETS: [&str; 2] = ["sami::driver", "sami::app"];

static TRACING_INITIALISED: OnceLock<Result<(), TelemetryError>> = OnceLock::new();

/// How log output is produced for one process.
#[derive(Debug, Clone, Builder)]
pub(crate) struct TracingOptions {
    #[builder(into, default = String::from("sami"))]
    service_name: String,
    /// Pretty logs with span progress; otherwise one JSON object per line.
    #[builder(default)]
    interactive: bool,
    level: Option<LevelFilter>,
}

/// Installs the log subscriber and OpenTelemetry layer.
///
/// Logs always go to stderr so that stdout carries only command output.
/// Only the first call installs a subscriber; later calls return its result.
pub(crate) fn initialise_tracing(
    options: &TracingOptions,
) -> Result<(), &'static TelemetryError> {
    TRACING_INITIALISED
        .get_or_init(|| install(options))
        .as_ref()
        .copied()
}

fn install(options: &TracingOptions) -> Result<(), TelemetryError> {
    let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder().build();
    let tracer = tracer_provider.tracer(options.service_name.clone());
    global::set_tracer_provider(tracer_provider);

    let log_filter = log_filter(options.level);

    if options.interactive && io::stderr().is_terminal() {
        let indicatif_layer = IndicatifLayer::new()
            .with_progress_style(progress_style())
            .with_tick_settings(TickSettings {
                default_tick_interval: Some(Duration::from_millis(120)),
                ..TickSettings::default()
            });
        let formatting_layer = fmt::layer()
            .pretty()
            .with_target(false)
            .with_writer(indicatif_layer.get_stderr_writer());
        let progress_layer = indicatif_layer.with_filter(filter::filter_fn(shows_progress));

        tracing_subscriber::registry()
            .with(formatting_layer.with_filter(log_filter))
            .with(progress_layer)
            .with(OpenTelemetryLayer::new(tracer))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .json()
                    .with_writer(io::stderr)
                    .with_filter(log_filter),
            )
            .with(OpenTelemetryLayer::new(tracer))
            .try_init()?;
    }

    Ok(())
}

fn log_filter(level: Option<LevelFilter>) -> EnvFilter {
    match level {
        Some(level) => EnvFilter::new(level.to_string()),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_error| EnvFilter::new(DEFAULT_DIRECTIVE)),
    }
}

fn progress_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan.bold} {span_name} {msg} {elapsed:.dim}")
        .unwrap_or_else(|_error| ProgressStyle::default_spinner())
}

fn shows_progress(metadata: &Metadata<'_>) -> bool {
    metadata.is_span()
        && *metadata.level() <= tracing::Level::INFO
        && PROGRESS_TARGETS
            .iter()
            .any(|target| metadata.target().starts_with(target))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn level_override_replaces_environment_filter() {
        assert_eq!("debug", log_filter(Some(LevelFilter::DEBUG)).to_string());
        assert_eq!("off", log_filter(Some(LevelFilter::OFF)).to_string());
    }

    #[test]
    fn options_default_to_json_logs_for_sami() {
        let options = TracingOptions::builder().build();

        assert_eq!("sami", options.service_name);
        assert!(!options.interactive);
        assert_eq!(None, options.level);
    }
}
