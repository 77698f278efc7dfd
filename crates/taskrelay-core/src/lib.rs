//! Taskrelay Core Library
//!
//! This crate provides the domain model, trace propagation primitives, error types
//! and configuration shared by the publisher, the consumer and the HTTP boundary.

pub mod config;
pub mod error;
pub mod headers;
pub mod models;
pub mod trace;

// Re-export commonly used types
pub use config::{Config, TransportKind};
pub use error::{ErrorMetadata, LogLevel, PipelineError, TraceError};
pub use headers::{HeaderCarrier, HeaderError, HeaderMap, HeaderValue, Headers};
pub use models::{DeletionPolicy, NewTask, Task, TracePropagation};
pub use trace::{Span, SpanRecord, SpanReporter, TraceContext, Tracer};
