use opentelemetry_sdk::{logs::LoggerProvider, trace::TracerProvider as SdkTracerProvider};

/// Where logs and spans go.
///
/// Logs always go to stdout as JSON. With `otel_enabled`, spans and log
/// records are also exported over OTLP/gRPC to `otel_endpoint`.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Reported as the `service.name` resource attribute
    pub service_name: String,
    pub otel_endpoint: String,
    pub otel_enabled: bool,
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "host-inventory-sync".to_string(),
            otel_endpoint: "http://localhost:4317".to_string(),
            otel_enabled: false,
            log_level: "info".to_string(),
        }
    }
}

/// Exporter pipelines that must be flushed on shutdown
pub struct TelemetryProviders {
    pub tracer_provider: SdkTracerProvider,
    pub logger_provider: LoggerProvider,
}
