use anyhow::{Context, Result};
use opentelemetry::{trace::TracerProvider, KeyValue};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{LogExporter, SpanExporter, WithExportConfig};
use opentelemetry_sdk::{
    logs::LoggerProvider,
    propagation::TraceContextPropagator,
    runtime,
    trace::{Sampler, TracerProvider as SdkTracerProvider},
    Resource,
};
use tracing::Subscriber;
use tracing_subscriber::{
    layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt, EnvFilter, Layer,
};

use super::{TelemetryConfig, TelemetryProviders};

/// Install the global subscriber. Returns the exporter providers when OTEL
/// export is enabled so the caller can flush them with [`shutdown_telemetry`].
pub fn init_telemetry(config: &TelemetryConfig) -> Result<Option<TelemetryProviders>> {
    let filter = env_filter(&config.log_level);

    if !config.otel_enabled {
        tracing_subscriber::registry()
            .with(filter)
            .with(stdout_layer())
            .try_init()
            .context("failed to install tracing subscriber")?;
        return Ok(None);
    }

    // Lets the NATS consumer continue the publisher's trace
    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    let providers = build_providers(config)?;
    otel_subscriber(filter, &providers, &config.service_name)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(Some(providers))
}

fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// JSON lines on stdout, built per subscriber stack
fn stdout_layer<S>() -> impl Layer<S> + Send + Sync
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(false)
}

fn otel_subscriber(
    filter: EnvFilter,
    providers: &TelemetryProviders,
    service_name: &str,
) -> impl Subscriber + Send + Sync + 'static {
    let tracer = providers.tracer_provider.tracer(service_name.to_string());

    // Span layer before the log bridge so exported log records carry the span context
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .with(OpenTelemetryTracingBridge::new(&providers.logger_provider))
        .with(stdout_layer())
}

fn build_providers(config: &TelemetryConfig) -> Result<TelemetryProviders> {
    let resource = Resource::new([KeyValue::new(
        opentelemetry_semantic_conventions::resource::SERVICE_NAME,
        config.service_name.clone(),
    )]);

    let span_exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otel_endpoint)
        .build()
        .context("failed to build OTLP span exporter")?;
    let tracer_provider = SdkTracerProvider::builder()
        .with_batch_exporter(span_exporter, runtime::Tokio)
        .with_sampler(Sampler::AlwaysOn)
        .with_resource(resource.clone())
        .build();

    let log_exporter = LogExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otel_endpoint)
        .build()
        .context("failed to build OTLP log exporter")?;
    let logger_provider = LoggerProvider::builder()
        .with_batch_exporter(log_exporter, runtime::Tokio)
        .with_resource(resource)
        .build();

    Ok(TelemetryProviders {
        tracer_provider,
        logger_provider,
    })
}

/// Flush and stop the exporters. The subscriber may already be gone, so
/// failures go to stderr.
pub fn shutdown_telemetry(providers: Option<TelemetryProviders>) {
    let Some(providers) = providers else {
        return;
    };

    if let Err(e) = providers.tracer_provider.shutdown() {
        eprintln!("tracer provider shutdown failed: {e:?}");
    }
    if let Err(e) = providers.logger_provider.shutdown() {
        eprintln!("logger provider shutdown failed: {e:?}");
    }
}
