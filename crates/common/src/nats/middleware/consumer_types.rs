use async_nats::HeaderMap;
use bytes::Bytes;

/// Request type for consuming a single NATS message through Tower.
///
/// This owns all the message data, allowing it to be passed through
/// Tower middleware layers without lifetime concerns.
#[derive(Debug, Clone)]
pub struct ConsumeRequest {
    /// The NATS subject the message was published to
    pub subject: String,
    /// The message payload
    pub payload: Bytes,
    /// Optional headers (used for trace context propagation)
    pub headers: Option<HeaderMap>,
}

impl ConsumeRequest {
    pub fn new(subject: String, payload: Bytes, headers: Option<HeaderMap>) -> Self {
        Self {
            subject,
            payload,
            headers,
        }
    }
}

/// How a consumed message is settled.
///
/// Delivery is at-most-once: neither variant requests redelivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeResponse {
    /// Message was handled (including deliberate no-ops)
    Ack,
    /// Message could not be handled; drop it for good
    Term(Option<String>),
}

impl ConsumeResponse {
    pub fn ack() -> Self {
        Self::Ack
    }

    pub fn term(reason: impl Into<String>) -> Self {
        Self::Term(Some(reason.into()))
    }

    pub fn is_ack(&self) -> bool {
        matches!(self, Self::Ack)
    }

    pub fn is_term(&self) -> bool {
        matches!(self, Self::Term(_))
    }

    /// Short label used in logs and span fields
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Ack => "ack",
            Self::Term(_) => "term",
        }
    }
}
