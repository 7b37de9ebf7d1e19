use crate::nats::{AckableMessage, ConsumeRequest, ConsumeResponse, JetStreamConsumer, PullConsumer};
use anyhow::{Context, Result};
use async_nats::jetstream;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::{Service, ServiceExt};
use tracing::{debug, error, info, warn};

/// Where and how a [`TowerConsumer`] attaches to JetStream.
#[derive(Debug, Clone)]
pub struct TowerConsumerConfig {
    pub stream_name: String,
    /// Durable consumer name. Reusing it across restarts resumes from the last acked message.
    pub consumer_name: String,
    pub filter_subject: String,
    pub batch_size: usize,
    pub max_wait: Duration,
}

/// A NATS consumer that processes messages through a Tower service stack.
///
/// Messages are handled strictly one at a time: the service call for a
/// message completes, and the message is settled, before the next one is
/// handed to the service. Every message is settled with either ack or term,
/// so the server never redelivers a message this consumer has seen.
pub struct TowerConsumer<S> {
    consumer: Box<dyn PullConsumer>,
    config: TowerConsumerConfig,
    service: S,
}

impl<S> TowerConsumer<S>
where
    S: Service<ConsumeRequest, Response = ConsumeResponse, Error = anyhow::Error>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    pub async fn new(
        jetstream: Arc<dyn JetStreamConsumer>,
        config: TowerConsumerConfig,
        service: S,
    ) -> Result<Self> {
        debug!(
            stream = %config.stream_name,
            consumer = %config.consumer_name,
            filter_subject = %config.filter_subject,
            "creating tower nats consumer"
        );

        let pull_config = jetstream::consumer::pull::Config {
            name: Some(config.consumer_name.clone()),
            durable_name: Some(config.consumer_name.clone()),
            filter_subject: config.filter_subject.clone(),
            ack_policy: jetstream::consumer::AckPolicy::Explicit,
            ..Default::default()
        };

        let consumer = jetstream
            .create_consumer(pull_config, &config.stream_name)
            .await
            .context("failed to create consumer")?;

        debug!(
            stream = %config.stream_name,
            consumer = %config.consumer_name,
            "tower nats consumer created successfully"
        );

        Ok(Self {
            consumer,
            config,
            service,
        })
    }

    /// Run the consumer loop until cancellation.
    ///
    /// The token is only observed while waiting for a batch. A fetched batch
    /// is always processed and settled in full, so shutdown never abandons a
    /// message halfway through its handler.
    pub async fn run(mut self, ctx: CancellationToken) -> Result<()> {
        debug!(
            stream = %self.config.stream_name,
            consumer = %self.config.consumer_name,
            "starting tower nats consumer"
        );

        loop {
            let fetched = tokio::select! {
                biased;
                _ = ctx.cancelled() => {
                    info!(
                        stream = %self.config.stream_name,
                        consumer = %self.config.consumer_name,
                        "received shutdown signal, stopping consumer"
                    );
                    break;
                }
                result = self.fetch_batch() => result,
            };

            match fetched {
                Ok(messages) => self.process_batch(messages).await,
                Err(e) => {
                    error!(
                        stream = %self.config.stream_name,
                        consumer = %self.config.consumer_name,
                        error = %e,
                        "error fetching batch"
                    );
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }

        debug!(
            stream = %self.config.stream_name,
            consumer = %self.config.consumer_name,
            "consumer stopped gracefully"
        );
        Ok(())
    }

    async fn fetch_batch(&self) -> Result<Vec<Box<dyn AckableMessage>>> {
        self.consumer
            .fetch_messages(self.config.batch_size, self.config.max_wait)
            .await
    }

    async fn process_batch(&mut self, messages: Vec<Box<dyn AckableMessage>>) {
        if messages.is_empty() {
            debug!("no messages in batch");
            return;
        }

        debug!(message_count = messages.len(), "received message batch");

        for msg in &messages {
            self.process_message(msg.as_ref()).await;
        }
    }

    async fn process_message(&mut self, msg: &dyn AckableMessage) {
        let request = ConsumeRequest::new(
            msg.subject().to_string(),
            Bytes::copy_from_slice(msg.payload()),
            msg.headers().cloned(),
        );

        let response = match ServiceExt::<ConsumeRequest>::ready(&mut self.service).await {
            Ok(service) => service.call(request).await,
            Err(e) => Err(e),
        };

        let response = response.unwrap_or_else(|e| {
            error!(
                subject = %msg.subject(),
                error = %e,
                "service error processing message"
            );
            ConsumeResponse::term(e.to_string())
        });

        match response {
            ConsumeResponse::Ack => {
                if let Err(e) = msg.ack().await {
                    error!(subject = %msg.subject(), error = %e, "failed to acknowledge message");
                }
            }
            ConsumeResponse::Term(reason) => {
                warn!(
                    subject = %msg.subject(),
                    reason = reason.as_deref().unwrap_or("unspecified"),
                    "dropping message without redelivery"
                );
                if let Err(e) = msg.term().await {
                    error!(subject = %msg.subject(), error = %e, "failed to terminate message");
                }
            }
        }
    }
}
