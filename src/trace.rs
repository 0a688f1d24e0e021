use opentelemetry::{global, KeyValue};
use opentelemetry_sdk::{
	metrics::{
		reader::{DefaultAggregationSelector, DefaultTemporalitySelector},
		Aggregation, Instrument, MeterProviderBuilder, PeriodicReader, SdkMeterProvider, Stream,
	},
	runtime,
	trace::{BatchConfig, Sampler, Tracer},
	Resource,
};
use opentelemetry_semantic_conventions::{
	resource::{DEPLOYMENT_ENVIRONMENT, SERVICE_NAME, SERVICE_VERSION},
	SCHEMA_URL,
};
use tracing_opentelemetry::MetricsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Histogram recorded for every page that has to be built.
pub const PAGE_BUILD_MS: &str = "page_build_ms";

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("metrics error: {0}")]
	Metrics(#[from] opentelemetry::metrics::MetricsError),
	#[error("trace error: {0}")]
	Trace(#[from] opentelemetry::trace::TraceError),
}

/// Constructs a [`Resource`] which describes the service.
fn resource() -> Resource {
	Resource::from_schema_url(
		[
			KeyValue::new(SERVICE_NAME, env!("CARGO_PKG_NAME")),
			KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
			KeyValue::new(
				DEPLOYMENT_ENVIRONMENT,
				if cfg!(debug_assertions) {
					"development"
				} else {
					"production"
				},
			),
		],
		SCHEMA_URL,
	)
}

/// Constructs an [`SdkMeterProvider`] that exports page build latency.
fn init_meter_provider() -> Result<SdkMeterProvider, Error> {
	let exporter = opentelemetry_otlp::new_exporter()
		.tonic()
		.build_metrics_exporter(
			Box::new(DefaultAggregationSelector::new()),
			Box::new(DefaultTemporalitySelector::new()),
		)?;

	let reader = PeriodicReader::builder(exporter, runtime::Tokio)
		.with_interval(std::time::Duration::from_secs(5))
		.build();

	let view_page_build = |instrument: &Instrument| -> Option<Stream> {
		if instrument.name == PAGE_BUILD_MS {
			Some(
				Stream::new()
					.name(PAGE_BUILD_MS)
					.aggregation(Aggregation::Default),
			)
		} else {
			None
		}
	};

	let meter_provider = MeterProviderBuilder::default()
		.with_resource(resource())
		.with_reader(reader)
		.with_view(view_page_build)
		.build();

	global::set_meter_provider(meter_provider.clone());

	Ok(meter_provider)
}

/// Constructs a [`Tracer`] with a custom sampling strategy and exporter.
fn init_tracer() -> Result<Tracer, Error> {
	Ok(opentelemetry_otlp::new_pipeline()
		.tracing()
		.with_trace_config(
			opentelemetry_sdk::trace::Config::default()
				.with_sampler(Sampler::TraceIdRatioBased(1.0))
				.with_resource(resource()),
		)
		.with_batch_config(BatchConfig::default())
		.with_exporter(opentelemetry_otlp::new_exporter().tonic())
		.install_batch(runtime::Tokio)?)
}

fn env_filter() -> EnvFilter {
	EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initializes a plain log subscriber, filtered by `RUST_LOG` (default `info`).
pub fn init_logging() {
	tracing_subscriber::registry()
		.with(env_filter())
		.with(tracing_subscriber::fmt::layer().with_ansi(true))
		.init();
}

/// Initializes the tracing subscriber with OpenTelemetry support, returning
/// a guard that cleans up the global tracer and meter provider when dropped.
pub fn init_tracing_subscriber() -> Result<OtelGuard, Error> {
	let meter_provider = init_meter_provider()?;
	let tracer = init_tracer()?;

	tracing_subscriber::registry()
		.with(env_filter())
		.with(tracing_subscriber::fmt::layer().with_ansi(true))
		.with(MetricsLayer::new(meter_provider.clone()))
		.with(tracing_opentelemetry::layer().with_tracer(tracer))
		.init();

	Ok(OtelGuard { meter_provider })
}

pub struct OtelGuard {
	meter_provider: SdkMeterProvider,
}

impl Drop for OtelGuard {
	fn drop(&mut self) {
		if let Err(err) = self.meter_provider.shutdown() {
			eprintln!("{err:?}");
		}

		opentelemetry::global::shutdown_tracer_provider();
	}
}
