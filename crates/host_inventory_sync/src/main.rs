mod config;

use common::http::{build_http_client, HttpClientConfig};
use common::nats::NatsClient;
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig, TelemetryProviders};
use crate::config::ServiceConfig;
use inventory_sync::http::{
    HostInventoryClient, HostInventoryClientConfig, SourceInventoryClient,
    SourceInventoryClientConfig,
};
use inventory_sync::{InventorySync, InventorySyncConfig};
use std::sync::Arc;
use std::time::Duration;
use sync_runner::Runner;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize telemetry (tracing + OpenTelemetry for traces and logs)
    let telemetry_providers: Option<TelemetryProviders> = match init_telemetry(&TelemetryConfig {
        service_name: config.otel_service_name.clone(),
        otel_endpoint: config.otel_endpoint.clone(),
        otel_enabled: config.otel_enabled,
        log_level: config.log_level.clone(),
    }) {
        Ok(providers) => providers,
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        otel_enabled = config.otel_enabled,
        otel_endpoint = %config.otel_endpoint,
        "Starting host-inventory-sync service"
    );
    debug!("Configuration: {:?}", config);

    let nats_client = match initialize_nats(&config).await {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to initialize NATS: {:#}", e);
            shutdown_telemetry(telemetry_providers);
            std::process::exit(1);
        }
    };

    let worker = match build_worker(&config, &nats_client).await {
        Ok(worker) => worker,
        Err(e) => {
            error!("Failed to initialize worker: {:#}", e);
            nats_client.close().await;
            shutdown_telemetry(telemetry_providers);
            std::process::exit(1);
        }
    };

    let result = Runner::new()
        .with_named_process("host_inventory_sync", worker.into_runner_process())
        .with_closer({
            let nats_for_close = Arc::clone(&nats_client);
            move || async move {
                info!("Running cleanup tasks...");
                nats_for_close.close().await;

                // Flush pending traces and logs
                shutdown_telemetry(telemetry_providers);

                info!("Cleanup complete");
                Ok(())
            }
        })
        .with_closer_timeout(Duration::from_secs(10))
        .run()
        .await;

    if let Err(e) = result {
        eprintln!("host-inventory-sync stopped with error: {:#}", e);
        std::process::exit(1);
    }
}

async fn initialize_nats(config: &ServiceConfig) -> anyhow::Result<Arc<NatsClient>> {
    info!("Initializing NATS...");
    let nats_client = NatsClient::connect(
        &config.nats_url(),
        Duration::from_secs(config.startup_timeout_secs),
    )
    .await?;

    nats_client
        .ensure_stream(
            &config.change_event_stream,
            std::slice::from_ref(&config.change_event_subject),
        )
        .await?;

    Ok(Arc::new(nats_client))
}

async fn build_worker(
    config: &ServiceConfig,
    nats_client: &NatsClient,
) -> anyhow::Result<InventorySync> {
    let http = build_http_client(&HttpClientConfig {
        connect_timeout: Duration::from_secs(config.http_connect_timeout_secs),
        request_timeout: Duration::from_secs(config.http_request_timeout_secs),
    })?;

    let source_api_url = config.source_api_url();
    info!(
        source_api_url = %source_api_url,
        ingress_api_url = %config.ingress_api_url,
        destination_api_url = %config.destination_api_url,
        "Inventory endpoints"
    );

    let source = Arc::new(SourceInventoryClient::new(
        http.clone(),
        SourceInventoryClientConfig {
            source_api_url,
            ingress_api_url: config.ingress_api_url.clone(),
        },
    )?);
    let destination = Arc::new(HostInventoryClient::new(
        http,
        HostInventoryClientConfig {
            destination_api_url: config.destination_api_url.clone(),
        },
    ));

    InventorySync::new(
        nats_client.create_consumer_client(),
        source,
        destination,
        InventorySyncConfig {
            change_event_stream: config.change_event_stream.clone(),
            change_event_subject: config.change_event_subject.clone(),
            consumer_name: config.consumer_name.clone(),
            nats_batch_size: config.nats_batch_size,
            nats_batch_wait_secs: config.nats_batch_wait_secs,
            create_concurrency: config.create_concurrency,
        },
    )
    .await
}
