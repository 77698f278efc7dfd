//! Ambient span scope and span lifecycle
//!
//! The active trace context is a tokio task-local, so a scope covers exactly one
//! future and is never shared between concurrently running tasks. Each [`Span`] is
//! mirrored as a `tracing` span carrying the hex ids, and reports a [`SpanRecord`]
//! exactly once when it finishes or is dropped.

use chrono::{DateTime, Utc};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::Instrument;

use crate::trace::TraceContext;

tokio::task_local! {
    static ACTIVE_CONTEXT: TraceContext;
}

/// A finished span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanRecord {
    pub name: &'static str,
    pub context: TraceContext,
    pub parent_span_id: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

/// Receives finished spans.
pub trait SpanReporter: Send + Sync {
    fn report(&self, record: SpanRecord);
}

/// Logs finished spans at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSpanReporter;

impl SpanReporter for LoggingSpanReporter {
    fn report(&self, record: SpanRecord) {
        tracing::debug!(
            span = record.name,
            trace_id = %record.context.trace_id_hex(),
            span_id = %record.context.span_id_hex(),
            parent_span_id = ?record.parent_span_id.map(|id| format!("{:016x}", id as u64)),
            duration_ms = record.duration.as_millis() as u64,
            "Span finished"
        );
    }
}

/// Keeps finished spans in memory.
#[derive(Debug, Default, Clone)]
pub struct RecordingSpanReporter {
    records: Arc<Mutex<Vec<SpanRecord>>>,
}

impl RecordingSpanReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<SpanRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl SpanReporter for RecordingSpanReporter {
    fn report(&self, record: SpanRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }
}

/// Creates spans and exposes the ambient trace scope.
#[derive(Clone)]
pub struct Tracer {
    reporter: Arc<dyn SpanReporter>,
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new(Arc::new(LoggingSpanReporter))
    }
}

impl Debug for Tracer {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Tracer").finish()
    }
}

impl Tracer {
    pub fn new(reporter: Arc<dyn SpanReporter>) -> Self {
        Self { reporter }
    }

    /// Context of the span currently in scope, if any.
    pub fn current_context(&self) -> Option<TraceContext> {
        ACTIVE_CONTEXT.try_with(|context| *context).ok()
    }

    /// Start a new trace. The root span id equals the trace id.
    pub fn new_trace(&self, name: &'static str) -> Span {
        let id = next_id();
        Span::start(
            name,
            TraceContext::new(id, id),
            None,
            self.reporter.clone(),
        )
    }

    /// Start a child of `parent` within the same trace.
    pub fn next_span(&self, parent: TraceContext, name: &'static str) -> Span {
        Span::start(
            name,
            TraceContext::new(parent.trace_id, next_id()),
            Some(parent.span_id),
            self.reporter.clone(),
        )
    }

    /// Continue an incoming trace when one is given, otherwise start a new one.
    pub fn continue_or_start(&self, incoming: Option<TraceContext>, name: &'static str) -> Span {
        match incoming {
            Some(parent) => self.next_span(parent, name),
            None => self.new_trace(name),
        }
    }
}

fn next_id() -> i64 {
    loop {
        let id: i64 = rand::random();
        if id != 0 {
            return id;
        }
    }
}

/// A started span. Finishes exactly once: on [`Span::finish`], at the end of
/// [`Span::scope`], or on drop (including unwinding and cancellation).
pub struct Span {
    name: &'static str,
    context: TraceContext,
    parent_span_id: Option<i64>,
    started_at: DateTime<Utc>,
    started: Instant,
    span: tracing::Span,
    reporter: Arc<dyn SpanReporter>,
    finished: bool,
}

impl Debug for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Span")
            .field("name", &self.name)
            .field("context", &self.context)
            .field("parent_span_id", &self.parent_span_id)
            .field("finished", &self.finished)
            .finish()
    }
}

impl Span {
    fn start(
        name: &'static str,
        context: TraceContext,
        parent_span_id: Option<i64>,
        reporter: Arc<dyn SpanReporter>,
    ) -> Self {
        let span = tracing::info_span!(
            "trace_span",
            otel.name = name,
            trace_id = %context.trace_id_hex(),
            span_id = %context.span_id_hex(),
            parent_span_id = tracing::field::Empty,
        );
        if let Some(parent) = parent_span_id {
            span.record(
                "parent_span_id",
                tracing::field::display(format!("{:016x}", parent as u64)),
            );
            #[cfg(feature = "observability-opentelemetry")]
            link_remote_parent(&span, TraceContext::new(context.trace_id, parent));
        }

        Self {
            name,
            context,
            parent_span_id,
            started_at: Utc::now(),
            started: Instant::now(),
            span,
            reporter,
            finished: false,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn context(&self) -> TraceContext {
        self.context
    }

    pub fn parent_span_id(&self) -> Option<i64> {
        self.parent_span_id
    }

    pub fn finish(mut self) {
        self.finish_once();
    }

    /// Run `fut` with this span as the ambient scope, then finish the span.
    pub async fn scope<F: Future>(self, fut: F) -> F::Output {
        let context = self.context;
        let instrumented = fut.instrument(self.span.clone());
        let output = ACTIVE_CONTEXT.scope(context, instrumented).await;
        self.finish();
        output
    }

    fn finish_once(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.reporter.report(SpanRecord {
            name: self.name,
            context: self.context,
            parent_span_id: self.parent_span_id,
            started_at: self.started_at,
            duration: self.started.elapsed(),
        });
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        self.finish_once();
    }
}

#[cfg(feature = "observability-opentelemetry")]
fn link_remote_parent(span: &tracing::Span, parent: TraceContext) {
    use opentelemetry::trace::{
        SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState,
    };
    use tracing_opentelemetry::OpenTelemetrySpanExt;

    let trace_id = TraceId::from_bytes(u128::from(parent.trace_id as u64).to_be_bytes());
    let span_id = SpanId::from_bytes((parent.span_id as u64).to_be_bytes());
    let remote = SpanContext::new(
        trace_id,
        span_id,
        TraceFlags::SAMPLED,
        true,
        TraceState::default(),
    );
    span.set_parent(opentelemetry::Context::new().with_remote_span_context(remote));
}
