use crate::domain::{ChangeEvent, ProcessOutcome, ReconciliationService};
use common::nats::{ConsumeRequest, ConsumeResponse};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;
use tracing::{debug, error};

/// Tower service for processing individual change event messages.
///
/// This service:
/// 1. Decodes the JSON change event
/// 2. Hands it to the ReconciliationService, which contains every failure
/// 3. Returns Ack when the event was handled, Term when it failed
///
/// Failed messages are terminated rather than nak'd, so JetStream never
/// redelivers them.
#[derive(Clone)]
pub struct ChangeEventService {
    reconciliation: Arc<ReconciliationService>,
}

impl ChangeEventService {
    pub fn new(reconciliation: Arc<ReconciliationService>) -> Self {
        Self { reconciliation }
    }
}

impl Service<ConsumeRequest> for ChangeEventService {
    type Response = ConsumeResponse;
    type Error = anyhow::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ConsumeRequest) -> Self::Future {
        let reconciliation = Arc::clone(&self.reconciliation);

        Box::pin(async move {
            let event = match ChangeEvent::from_slice(&req.payload) {
                Ok(event) => event,
                Err(e) => {
                    error!(
                        subject = %req.subject,
                        error_kind = e.kind().as_str(),
                        error = %e,
                        "failed to decode change event"
                    );
                    return Ok(ConsumeResponse::term(e.to_string()));
                }
            };

            debug!(
                subject = %req.subject,
                source_id = event.source_id.as_deref().unwrap_or_default(),
                "processing change event"
            );

            match reconciliation.process(&event).await {
                ProcessOutcome::Reconciled(_) | ProcessOutcome::Skipped(_) => {
                    Ok(ConsumeResponse::ack())
                }
                ProcessOutcome::Failed(e) => Ok(ConsumeResponse::term(format!(
                    "{} error: {}",
                    e.kind().as_str(),
                    e
                ))),
            }
        })
    }
}
