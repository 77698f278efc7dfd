//! B3 trace-scope middleware for inbound HTTP requests.

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::{middleware::Next, response::Response};

use taskrelay_core::{TraceContext, Tracer};

pub const B3_TRACE_ID_HEADER: &str = "X-B3-TraceId";
pub const B3_SPAN_ID_HEADER: &str = "X-B3-SpanId";

const REQUEST_SPAN_NAME: &str = "http_request";

/// Trace scope middleware
/// Runs the rest of the request inside a trace span so handlers can publish with the
/// ambient context:
/// - Continues the caller's trace when both B3 headers are valid hex ids
/// - Starts a new root trace otherwise
/// - Echoes the request span's ids in the response B3 headers
///
/// Install with `axum::middleware::from_fn_with_state(tracer, trace_scope_middleware)`.
pub async fn trace_scope_middleware(
    State(tracer): State<Tracer>,
    mut request: Request,
    next: Next,
) -> Response {
    let incoming = incoming_context(request.headers());
    let span = tracer.continue_or_start(incoming, REQUEST_SPAN_NAME);
    let context = span.context();

    request.extensions_mut().insert(context);

    let mut response = span.scope(next.run(request)).await;

    if let Ok(value) = HeaderValue::from_str(&context.trace_id_hex()) {
        response.headers_mut().insert(B3_TRACE_ID_HEADER, value);
    }
    if let Ok(value) = HeaderValue::from_str(&context.span_id_hex()) {
        response.headers_mut().insert(B3_SPAN_ID_HEADER, value);
    }

    response
}

fn incoming_context(headers: &HeaderMap) -> Option<TraceContext> {
    let trace_id = headers.get(B3_TRACE_ID_HEADER)?.to_str().ok()?;
    let span_id = headers.get(B3_SPAN_ID_HEADER)?.to_str().ok()?;
    let context = TraceContext::from_b3(trace_id, span_id);
    if context.is_none() {
        tracing::debug!(
            trace_id = %trace_id,
            span_id = %span_id,
            "Ignoring malformed B3 headers, starting a new trace"
        );
    }
    context
}
