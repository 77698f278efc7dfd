//! Distributed trace propagation
//!
//! - [`TraceContext`]: the (trace id, span id) pair carried across the queue
//! - [`codec`]: encodes the pair into message headers and decodes it back
//! - [`Tracer`]: ambient span scope, root/child span creation and span reporting

pub mod codec;
mod context;
mod tracer;

pub use codec::{SPAN_ID_HEADER, TRACE_ID_HEADER};
pub use context::TraceContext;
pub use tracer::{LoggingSpanReporter, RecordingSpanReporter, Span, SpanRecord, SpanReporter, Tracer};
