use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // Queue configuration
    /// NATS server host
    #[serde(default = "default_queue_host")]
    pub queue_host: String,

    /// NATS server port
    #[serde(default = "default_queue_port")]
    pub queue_port: u16,

    /// Startup timeout for initialization operations in seconds
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    /// NATS JetStream stream carrying persister output
    #[serde(default = "default_change_event_stream")]
    pub change_event_stream: String,

    /// Subject the change events are published on
    #[serde(default = "default_change_event_subject")]
    pub change_event_subject: String,

    /// Durable consumer name; restarts resume from its last acked message
    #[serde(default = "default_consumer_name")]
    pub consumer_name: String,

    /// Batch size for consumer
    #[serde(default = "default_nats_batch_size")]
    pub nats_batch_size: usize,

    /// Max wait time for batches in seconds
    #[serde(default = "default_nats_batch_wait_secs")]
    pub nats_batch_wait_secs: u64,

    // Source inventory
    /// Full source inventory API base; overrides the host/port/path settings below
    #[serde(default)]
    pub source_api_url: Option<String>,

    #[serde(default = "default_source_api_host")]
    pub source_api_host: String,

    #[serde(default = "default_source_api_port")]
    pub source_api_port: u16,

    /// Optional path prefix, with or without a leading slash
    #[serde(default)]
    pub source_api_path_prefix: Option<String>,

    /// Optional application name segment placed after the prefix
    #[serde(default)]
    pub source_api_app_name: Option<String>,

    /// Ingress API base used for linkage write-back
    #[serde(default = "default_ingress_api_url")]
    pub ingress_api_url: String,

    // Destination inventory
    /// Host based inventory API base
    #[serde(default = "default_destination_api_url")]
    pub destination_api_url: String,

    // HTTP
    #[serde(default = "default_http_connect_timeout_secs")]
    pub http_connect_timeout_secs: u64,

    #[serde(default = "default_http_request_timeout_secs")]
    pub http_request_timeout_secs: u64,

    /// Host creations in flight per change event (1 = sequential)
    #[serde(default = "default_create_concurrency")]
    pub create_concurrency: usize,

    // OpenTelemetry configuration
    /// Enable OpenTelemetry export
    #[serde(default = "default_otel_enabled")]
    pub otel_enabled: bool,

    /// OpenTelemetry OTLP endpoint
    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    /// Service name reported to OpenTelemetry
    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_queue_host() -> String {
    "localhost".to_string()
}

fn default_queue_port() -> u16 {
    4222
}

fn default_startup_timeout_secs() -> u64 {
    30
}

fn default_change_event_stream() -> String {
    "persister_output".to_string()
}

fn default_change_event_subject() -> String {
    "platform.topological-inventory.persister-output".to_string()
}

fn default_consumer_name() -> String {
    "host_inventory_sync_worker".to_string()
}

fn default_nats_batch_size() -> usize {
    1
}

fn default_nats_batch_wait_secs() -> u64 {
    5
}

fn default_source_api_host() -> String {
    "localhost".to_string()
}

fn default_source_api_port() -> u16 {
    3000
}

fn default_ingress_api_url() -> String {
    "http://localhost:9292/api/topological-inventory-ingress/v0".to_string()
}

fn default_destination_api_url() -> String {
    "http://localhost:8081/api/inventory/v1".to_string()
}

fn default_http_connect_timeout_secs() -> u64 {
    15
}

fn default_http_request_timeout_secs() -> u64 {
    30
}

fn default_create_concurrency() -> usize {
    1
}

fn default_otel_enabled() -> bool {
    false
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_service_name() -> String {
    "host-inventory-sync".to_string()
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("HOST_SYNC"))
            .build()?
            .try_deserialize()
    }

    pub fn nats_url(&self) -> String {
        format!("nats://{}:{}", self.queue_host, self.queue_port)
    }

    /// The explicit `source_api_url`, or one assembled from host, port, prefix and app name
    pub fn source_api_url(&self) -> String {
        match self.source_api_url.as_deref().filter(|url| !url.is_empty()) {
            Some(url) => url.to_string(),
            None => build_source_api_url(
                &self.source_api_host,
                self.source_api_port,
                self.source_api_path_prefix.as_deref(),
                self.source_api_app_name.as_deref(),
            ),
        }
    }
}

/// `http://host:port[/prefix][/app_name]/v0.1`
pub fn build_source_api_url(
    host: &str,
    port: u16,
    path_prefix: Option<&str>,
    app_name: Option<&str>,
) -> String {
    let mut url = format!("http://{host}:{port}");
    for segment in [path_prefix, app_name].into_iter().flatten() {
        let segment = segment.trim_matches('/');
        if !segment.is_empty() {
            url.push('/');
            url.push_str(segment);
        }
    }
    url.push_str("/v0.1");
    url
}
