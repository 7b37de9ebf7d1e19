use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::nats::trace_context::link_to_publisher;
use crate::nats::{ConsumeRequest, ConsumeResponse};
use tower::{Layer, Service};
use tracing::{info_span, Instrument};

/// Names the span opened for every consumed message
#[derive(Clone, Debug)]
pub struct NatsConsumeTracingConfig {
    pub operation: &'static str,
}

impl NatsConsumeTracingConfig {
    pub fn new(operation: &'static str) -> Self {
        Self { operation }
    }
}

/// Tower layer that opens one span per consumed message, parented to the
/// publisher's trace when the message carries W3C trace context headers.
#[derive(Clone)]
pub struct NatsConsumeTracingLayer {
    config: NatsConsumeTracingConfig,
}

impl NatsConsumeTracingLayer {
    pub fn new(config: NatsConsumeTracingConfig) -> Self {
        Self { config }
    }
}

impl<S> Layer<S> for NatsConsumeTracingLayer {
    type Service = NatsConsumeTracingService<S>;

    fn layer(&self, service: S) -> Self::Service {
        NatsConsumeTracingService {
            inner: service,
            config: self.config.clone(),
        }
    }
}

#[derive(Clone)]
pub struct NatsConsumeTracingService<S> {
    inner: S,
    config: NatsConsumeTracingConfig,
}

impl<S> Service<ConsumeRequest> for NatsConsumeTracingService<S>
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
        let span = info_span!(
            target: "nats",
            "nats_consume",
            otel.name = self.config.operation,
            messaging.system = "nats",
            messaging.operation = "process",
            messaging.destination.name = %req.subject,
            messaging.message.body.size = req.payload.len(),
            outcome = tracing::field::Empty,
            remote_parent = false,
        );

        if link_to_publisher(&span, req.headers.as_ref()) {
            span.record("remote_parent", true);
        }

        let mut inner = self.inner.clone();
        let record_span = span.clone();

        Box::pin(
            async move {
                let result = inner.call(req).await;
                if let Ok(response) = &result {
                    record_span.record("outcome", response.outcome());
                }
                result
            }
            .instrument(span),
        )
    }
}
