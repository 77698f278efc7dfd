//! Trace context codec
//!
//! Writes the current trace/span ids into message headers on publish and reads them
//! back on consume. Header values are 64-bit integers; numeric strings are accepted
//! when decoding since some transports only deliver string attributes.

use crate::error::TraceError;
use crate::headers::{HeaderCarrier, HeaderError, HeaderMap, HeaderValue, Headers};
use crate::trace::{Span, TraceContext, Tracer};

pub const TRACE_ID_HEADER: &str = "SleuthTraceId";
pub const SPAN_ID_HEADER: &str = "SleuthSpanId";

/// Encode the ambient trace scope of `tracer` into header entries.
///
/// Fails with [`TraceError::NoActiveTrace`] when no span is in scope.
pub fn encode(tracer: &Tracer) -> Result<HeaderMap, TraceError> {
    let context = tracer
        .current_context()
        .ok_or(TraceError::NoActiveTrace)?;
    Ok(encode_context(&context))
}

pub fn encode_context(context: &TraceContext) -> HeaderMap {
    let mut map = HeaderMap::new();
    map.insert(
        TRACE_ID_HEADER.to_string(),
        HeaderValue::Number(context.trace_id),
    );
    map.insert(
        SPAN_ID_HEADER.to_string(),
        HeaderValue::Number(context.span_id),
    );
    map
}

/// Write both trace headers into `headers`.
pub fn inject(context: &TraceContext, headers: &mut Headers) -> Result<(), HeaderError> {
    for (key, value) in encode_context(context) {
        headers.insert(key, value)?;
    }
    Ok(())
}

/// Drop both trace headers from an outgoing header set.
pub fn clear(headers: &mut HeaderMap) {
    headers.remove(TRACE_ID_HEADER);
    headers.remove(SPAN_ID_HEADER);
}

/// Decode a trace context from any header carrier.
///
/// Both headers must be present and coercible to `i64`; a partially populated
/// context is never returned.
pub fn decode<C: HeaderCarrier + ?Sized>(carrier: &C) -> Result<TraceContext, TraceError> {
    let headers = carrier.headers();
    let trace_id = headers
        .get_i64(TRACE_ID_HEADER)
        .ok_or(TraceError::MissingHeaders {
            header: TRACE_ID_HEADER,
        })?;
    let span_id = headers
        .get_i64(SPAN_ID_HEADER)
        .ok_or(TraceError::MissingHeaders {
            header: SPAN_ID_HEADER,
        })?;
    Ok(TraceContext::new(trace_id, span_id))
}

/// True if at least one trace header is present.
pub fn has_trace_headers<C: HeaderCarrier + ?Sized>(carrier: &C) -> bool {
    let headers = carrier.headers();
    headers.contains_key(TRACE_ID_HEADER) || headers.contains_key(SPAN_ID_HEADER)
}

/// Start a child span of the decoded remote context.
///
/// The returned span finishes exactly once, when it is finished explicitly or dropped.
pub fn open_child_span(tracer: &Tracer, parent: TraceContext, name: &'static str) -> Span {
    tracer.next_span(parent, name)
}
