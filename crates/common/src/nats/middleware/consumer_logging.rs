use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use crate::nats::{ConsumeRequest, ConsumeResponse};
use tower::{Layer, Service};
use tracing::{error, info, warn};

/// Tower layer that writes one log line per consumed message: subject,
/// payload size, how it was settled and how long handling took.
#[derive(Clone, Default)]
pub struct NatsConsumeLoggingLayer;

impl NatsConsumeLoggingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for NatsConsumeLoggingLayer {
    type Service = NatsConsumeLoggingService<S>;

    fn layer(&self, service: S) -> Self::Service {
        NatsConsumeLoggingService { inner: service }
    }
}

#[derive(Clone)]
pub struct NatsConsumeLoggingService<S> {
    inner: S,
}

impl<S> Service<ConsumeRequest> for NatsConsumeLoggingService<S>
where
    S: Service<ConsumeRequest, Response = ConsumeResponse> + Clone + Send + 'static,
    S::Error: std::fmt::Display + Send,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: ConsumeRequest) -> Self::Future {
        let subject = req.subject.clone();
        let payload_bytes = req.payload.len();
        let started = Instant::now();
        let future = self.inner.call(req);

        // The caller's span (the tracing layer's, when stacked) is already
        // entered while this future is polled.
        Box::pin(async move {
            let result = future.await;
            let duration_ms = started.elapsed().as_millis() as u64;

            match &result {
                Ok(ConsumeResponse::Ack) => info!(
                    subject = %subject,
                    payload_bytes,
                    outcome = "ack",
                    duration_ms,
                    "message handled"
                ),
                Ok(ConsumeResponse::Term(reason)) => warn!(
                    subject = %subject,
                    payload_bytes,
                    outcome = "term",
                    reason = reason.as_deref().unwrap_or_default(),
                    duration_ms,
                    "message dropped"
                ),
                Err(e) => error!(
                    subject = %subject,
                    payload_bytes,
                    duration_ms,
                    error = %e,
                    "message handler failed"
                ),
            }

            result
        })
    }
}
