use crate::domain::{
    DestinationInventory, ReconciliationConfig, ReconciliationService, SourceInventory,
};
use crate::nats::ChangeEventConsumer;
use common::nats::{JetStreamConsumer, TowerConsumerConfig};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct InventorySyncConfig {
    pub change_event_stream: String,
    pub change_event_subject: String,
    pub consumer_name: String,
    pub nats_batch_size: usize,
    pub nats_batch_wait_secs: u64,
    pub create_concurrency: usize,
}

/// The host inventory sync worker: one durable consumer driving the
/// reconciliation engine
pub struct InventorySync {
    consumer: ChangeEventConsumer,
}

impl InventorySync {
    pub async fn new(
        jetstream: Arc<dyn JetStreamConsumer>,
        source: Arc<dyn SourceInventory>,
        destination: Arc<dyn DestinationInventory>,
        config: InventorySyncConfig,
    ) -> anyhow::Result<Self> {
        info!("Initializing host inventory sync worker");

        let reconciliation = Arc::new(ReconciliationService::new(
            source,
            destination,
            ReconciliationConfig {
                create_concurrency: config.create_concurrency,
            },
        ));

        let consumer = ChangeEventConsumer::new(
            jetstream,
            TowerConsumerConfig {
                stream_name: config.change_event_stream,
                consumer_name: config.consumer_name,
                filter_subject: config.change_event_subject,
                batch_size: config.nats_batch_size,
                max_wait: Duration::from_secs(config.nats_batch_wait_secs),
            },
            reconciliation,
        )
        .await?;

        info!("Host inventory sync worker initialized");
        Ok(Self { consumer })
    }

    pub fn into_runner_process(
        self,
    ) -> impl FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
           + Send {
        let consumer = self.consumer;
        move |ctx| Box::pin(async move { consumer.run(ctx).await })
    }
}
