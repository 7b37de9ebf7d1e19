use crate::domain::ReconciliationService;
use crate::nats::ChangeEventService;
use anyhow::Result;
use common::nats::{
    JetStreamConsumer, NatsConsumeLoggingLayer, NatsConsumeLoggingService,
    NatsConsumeTracingConfig, NatsConsumeTracingLayer, NatsConsumeTracingService, TowerConsumer,
    TowerConsumerConfig,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tracing::debug;

/// Type alias for the layered change event consumer service
type ChangeEventLayeredService =
    NatsConsumeTracingService<NatsConsumeLoggingService<ChangeEventService>>;

/// Durable JetStream consumer feeding change events to the reconciliation
/// engine one message at a time
pub struct ChangeEventConsumer {
    consumer: TowerConsumer<ChangeEventLayeredService>,
}

impl ChangeEventConsumer {
    pub async fn new(
        jetstream: Arc<dyn JetStreamConsumer>,
        config: TowerConsumerConfig,
        reconciliation: Arc<ReconciliationService>,
    ) -> Result<Self> {
        debug!(
            stream = %config.stream_name,
            consumer = %config.consumer_name,
            filter = %config.filter_subject,
            "initializing change event consumer with Tower middleware"
        );

        let layered_service = ServiceBuilder::new()
            .layer(NatsConsumeTracingLayer::new(NatsConsumeTracingConfig::new(
                "process_change_event",
            )))
            .layer(NatsConsumeLoggingLayer::new())
            .service(ChangeEventService::new(reconciliation));

        let consumer = TowerConsumer::new(jetstream, config, layered_service).await?;

        Ok(Self { consumer })
    }

    /// Run the consumer loop until cancellation
    pub async fn run(self, ctx: CancellationToken) -> Result<()> {
        debug!("starting change event consumer");
        self.consumer.run(ctx).await
    }
}
