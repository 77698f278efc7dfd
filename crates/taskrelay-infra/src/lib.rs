//! Taskrelay Infrastructure Library
//!
//! Shared infrastructure for the taskrelay binary:
//! - Telemetry initialization (tracing, optional OpenTelemetry export)
//! - Trace-scope middleware for the HTTP boundary
//! - Error response body

#[cfg(feature = "middleware")]
pub mod middleware;

#[cfg(feature = "observability-basic")]
pub mod telemetry;

pub mod error;

// Re-export commonly used types
#[cfg(feature = "middleware")]
pub use middleware::trace_scope_middleware;

#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};

pub use error::ErrorResponse;
