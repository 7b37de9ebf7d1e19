use crate::nats::traits::{AckableMessage, JetStreamConsumer, PullConsumer};
use anyhow::{Context, Result};
use async_nats::jetstream::{self, stream::Config as StreamConfig};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One NATS connection and the JetStream context layered on it.
///
/// Owned by the process; consumers only see it through [`JetStreamConsumer`].
pub struct NatsClient {
    client: async_nats::Client,
    jetstream: jetstream::Context,
}

impl NatsClient {
    /// Connect, giving up after `connection_timeout`
    pub async fn connect(url: &str, connection_timeout: Duration) -> Result<Self> {
        info!(url = %url, timeout_ms = connection_timeout.as_millis(), "Connecting to NATS");

        let client = async_nats::ConnectOptions::new()
            .name("host-inventory-sync")
            .connection_timeout(connection_timeout)
            .connect(url)
            .await
            .with_context(|| format!("failed to connect to NATS at {url}"))?;

        info!("Connected to NATS");
        Ok(Self {
            jetstream: jetstream::new(client.clone()),
            client,
        })
    }

    /// Bind to `stream_name`, creating it over `subjects` when it does not exist.
    /// An existing stream keeps its configuration.
    pub async fn ensure_stream(&self, stream_name: &str, subjects: &[String]) -> Result<()> {
        let mut stream = self
            .jetstream
            .get_or_create_stream(StreamConfig {
                name: stream_name.to_string(),
                subjects: subjects.to_vec(),
                description: Some("Inventory change events".to_string()),
                ..Default::default()
            })
            .await
            .with_context(|| format!("failed to get or create stream {stream_name}"))?;

        let info = stream.info().await.context("failed to read stream info")?;
        info!(
            stream = %stream_name,
            subjects = ?info.config.subjects,
            messages = info.state.messages,
            "Stream ready"
        );
        Ok(())
    }

    pub fn jetstream(&self) -> &jetstream::Context {
        &self.jetstream
    }

    /// Consumer-side handle on this connection's JetStream context
    pub fn create_consumer_client(&self) -> Arc<dyn JetStreamConsumer> {
        Arc::new(NatsJetStreamConsumer::new(self.jetstream.clone()))
    }

    /// Flush buffered writes, pending acks included, before the process exits.
    /// The socket itself closes when the last handle drops.
    pub async fn close(&self) {
        info!("Closing NATS connection");
        if let Err(e) = self.client.flush().await {
            warn!(error = %e, "failed to flush NATS connection on close");
        }
    }
}

/// [`JetStreamConsumer`] backed by an async-nats JetStream context
pub struct NatsJetStreamConsumer {
    context: jetstream::Context,
}

impl NatsJetStreamConsumer {
    pub fn new(context: jetstream::Context) -> Self {
        Self { context }
    }
}

#[async_trait]
impl JetStreamConsumer for NatsJetStreamConsumer {
    async fn create_consumer(
        &self,
        config: jetstream::consumer::pull::Config,
        stream_name: &str,
    ) -> Result<Box<dyn PullConsumer>> {
        let durable_name = config.durable_name.clone().unwrap_or_default();
        let consumer = self
            .context
            .create_consumer_on_stream(config, stream_name)
            .await
            .with_context(|| {
                format!("failed to create consumer {durable_name} on stream {stream_name}")
            })?;

        debug!(stream = %stream_name, consumer = %durable_name, "bound pull consumer");
        Ok(Box::new(NatsPullConsumer { consumer }))
    }
}

/// [`PullConsumer`] backed by an async-nats pull consumer
pub struct NatsPullConsumer {
    consumer: jetstream::consumer::PullConsumer,
}

#[async_trait]
impl PullConsumer for NatsPullConsumer {
    async fn fetch_messages(
        &self,
        max_messages: usize,
        expires: Duration,
    ) -> Result<Vec<Box<dyn AckableMessage>>> {
        let batch = self
            .consumer
            .fetch()
            .max_messages(max_messages)
            .expires(expires)
            .messages()
            .await
            .context("failed to fetch messages")?;

        let messages = batch
            .filter_map(|delivered| async move {
                match delivered {
                    Ok(message) => Some(Box::new(message) as Box<dyn AckableMessage>),
                    Err(e) => {
                        // Undelivered, so nothing to settle; the next fetch continues
                        warn!(error = %e, "error receiving message from batch");
                        None
                    }
                }
            })
            .collect()
            .await;

        Ok(messages)
    }
}
