//! Error types module
//!
//! Pipeline failures are unified under [`PipelineError`]. Every variant carries the
//! target queue and, when known, the message or task identifier so that errors
//! crossing a component boundary can be logged without extra context.

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like malformed requests
    Debug,
    /// Warning level - for recoverable issues
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "SERIALIZATION_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// Trace context could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TraceError {
    #[error("no active trace span in scope")]
    NoActiveTrace,

    #[error("trace header '{header}' is missing or not a 64-bit integer")]
    MissingHeaders { header: &'static str },
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Failed to serialize task {task_id} for queue '{queue}'")]
    Serialization {
        queue: String,
        task_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to deserialize message {message_id} from queue '{queue}'")]
    Deserialization {
        queue: String,
        message_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Trace context unavailable for queue '{queue}'")]
    Trace {
        queue: String,
        #[source]
        source: TraceError,
    },

    #[error("Processing of message {message_id} from queue '{queue}' failed")]
    Processing {
        queue: String,
        message_id: String,
        task_id: Option<String>,
        #[source]
        source: anyhow::Error,
    },

    #[error("Queue transport error on '{queue}'")]
    Transport {
        queue: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl PipelineError {
    pub fn queue(&self) -> &str {
        match self {
            PipelineError::Serialization { queue, .. }
            | PipelineError::Deserialization { queue, .. }
            | PipelineError::Trace { queue, .. }
            | PipelineError::Processing { queue, .. }
            | PipelineError::Transport { queue, .. } => queue,
        }
    }

    /// True when publishing was refused because no trace span was in scope.
    pub fn is_no_active_trace(&self) -> bool {
        matches!(
            self,
            PipelineError::Trace {
                source: TraceError::NoActiveTrace,
                ..
            }
        )
    }

    /// True when processing failed because trace headers could not be decoded.
    pub fn is_missing_trace_headers(&self) -> bool {
        match self {
            PipelineError::Trace { source, .. } => {
                matches!(source, TraceError::MissingHeaders { .. })
            }
            PipelineError::Processing { source, .. } => matches!(
                source.downcast_ref::<TraceError>(),
                Some(TraceError::MissingHeaders { .. })
            ),
            _ => false,
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, log_level).
fn pipeline_error_static_metadata(err: &PipelineError) -> (u16, &'static str, bool, LogLevel) {
    match err {
        PipelineError::Serialization { .. } => {
            (500, "SERIALIZATION_ERROR", false, LogLevel::Error)
        }
        PipelineError::Deserialization { .. } => {
            (422, "DESERIALIZATION_ERROR", false, LogLevel::Warn)
        }
        PipelineError::Trace {
            source: TraceError::NoActiveTrace,
            ..
        } => (500, "NO_ACTIVE_TRACE", false, LogLevel::Error),
        PipelineError::Trace { .. } => (400, "MISSING_TRACE_HEADERS", false, LogLevel::Warn),
        PipelineError::Processing { .. } => (500, "PROCESSING_ERROR", true, LogLevel::Error),
        PipelineError::Transport { .. } => (503, "QUEUE_UNAVAILABLE", true, LogLevel::Error),
    }
}

impl ErrorMetadata for PipelineError {
    fn http_status_code(&self) -> u16 {
        pipeline_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        pipeline_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        pipeline_error_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        pipeline_error_static_metadata(self).3
    }

    fn client_message(&self) -> String {
        match self {
            PipelineError::Serialization { .. } => "Failed to encode task".to_string(),
            PipelineError::Deserialization { .. } => "Failed to decode task".to_string(),
            PipelineError::Trace { source, .. } => source.to_string(),
            PipelineError::Processing { .. } => "Task processing failed".to_string(),
            PipelineError::Transport { .. } => "Task queue unavailable".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_transport() {
        let err = PipelineError::Transport {
            queue: "dev-task.std".to_string(),
            source: "connection refused".into(),
        };
        assert_eq!(err.http_status_code(), 503);
        assert_eq!(err.error_code(), "QUEUE_UNAVAILABLE");
        assert!(err.is_recoverable());
        assert_eq!(err.queue(), "dev-task.std");
        assert!(err.detailed_message().contains("connection refused"));
    }

    #[test]
    fn test_no_active_trace_detection() {
        let err = PipelineError::Trace {
            queue: "q".to_string(),
            source: TraceError::NoActiveTrace,
        };
        assert!(err.is_no_active_trace());
        assert!(!err.is_missing_trace_headers());
        assert_eq!(err.error_code(), "NO_ACTIVE_TRACE");
    }

    #[test]
    fn test_missing_headers_detected_through_processing_wrapper() {
        let err = PipelineError::Processing {
            queue: "q".to_string(),
            message_id: "m-1".to_string(),
            task_id: None,
            source: TraceError::MissingHeaders {
                header: "SleuthSpanId",
            }
            .into(),
        };
        assert!(err.is_missing_trace_headers());
        assert!(err.detailed_message().contains("SleuthSpanId"));
    }
}
