use anyhow::Result;
use async_nats::jetstream;
use async_nats::HeaderMap;
use async_trait::async_trait;

/// Trait for JetStream consumer operations
/// Abstracts the operations needed to create and use a NATS JetStream consumer
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait JetStreamConsumer: Send + Sync {
    /// Create (or bind to) a durable pull consumer on a stream
    async fn create_consumer(
        &self,
        config: jetstream::consumer::pull::Config,
        stream_name: &str,
    ) -> Result<Box<dyn PullConsumer>>;
}

/// Trait for pull consumer operations
/// Abstracts the fetch operation on a pull consumer
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PullConsumer: Send + Sync {
    /// Fetch up to `max_messages`, waiting at most `expires` for the batch to fill
    async fn fetch_messages(
        &self,
        max_messages: usize,
        expires: std::time::Duration,
    ) -> Result<Vec<Box<dyn AckableMessage>>>;
}

/// A delivered message that must be settled exactly once, either acknowledged
/// or terminated. Neither outcome asks the server for redelivery.
#[async_trait]
pub trait AckableMessage: Send + Sync {
    fn subject(&self) -> &str;

    fn payload(&self) -> &[u8];

    fn headers(&self) -> Option<&HeaderMap>;

    /// Acknowledge successful handling
    async fn ack(&self) -> Result<()>;

    /// Tell the server the message was handled and must never be redelivered
    async fn term(&self) -> Result<()>;
}

#[async_trait]
impl AckableMessage for jetstream::Message {
    fn subject(&self) -> &str {
        self.message.subject.as_str()
    }

    fn payload(&self) -> &[u8] {
        &self.message.payload
    }

    fn headers(&self) -> Option<&HeaderMap> {
        self.message.headers.as_ref()
    }

    async fn ack(&self) -> Result<()> {
        self.ack_with(jetstream::AckKind::Ack)
            .await
            .map_err(|e| anyhow::anyhow!("failed to ack message: {e}"))
    }

    async fn term(&self) -> Result<()> {
        self.ack_with(jetstream::AckKind::Term)
            .await
            .map_err(|e| anyhow::anyhow!("failed to terminate message: {e}"))
    }
}
