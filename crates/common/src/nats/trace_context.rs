use async_nats::HeaderMap;
use opentelemetry::propagation::Extractor;
use opentelemetry::{global, Context};
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

const TRACEPARENT: &str = "traceparent";
const TRACESTATE: &str = "tracestate";

/// Read-only view of message headers for the global text map propagator
struct HeaderCarrier<'a>(&'a HeaderMap);

impl Extractor for HeaderCarrier<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|value| value.as_str())
    }

    fn keys(&self) -> Vec<&str> {
        [TRACEPARENT, TRACESTATE]
            .into_iter()
            .filter(|key| self.0.get(*key).is_some())
            .collect()
    }
}

/// The publisher's trace context, or `None` when the message carries no `traceparent`.
pub fn remote_context(headers: Option<&HeaderMap>) -> Option<Context> {
    let headers = headers.filter(|headers| headers.get(TRACEPARENT).is_some())?;
    Some(global::get_text_map_propagator(|propagator| {
        propagator.extract(&HeaderCarrier(headers))
    }))
}

/// Parent `span` on the trace the message was published under. Returns
/// whether a remote parent was found.
///
/// Without a configured propagator (OTEL disabled) the extracted context is
/// empty and the span keeps its local parent.
pub fn link_to_publisher(span: &Span, headers: Option<&HeaderMap>) -> bool {
    match remote_context(headers) {
        Some(parent) => {
            span.set_parent(parent);
            true
        }
        None => false,
    }
}
