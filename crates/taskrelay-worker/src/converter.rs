//! Task to envelope conversion
//!
//! Builds the outgoing envelope for a task. When the caller already holds a mutable
//! header accessor the task headers are merged into it; a read-only snapshot (or no
//! accessor at all) gets a fresh header set instead. Trace headers carried by the
//! accessor are dropped; the publisher attaches its own.

use taskrelay_core::trace::codec;
use taskrelay_core::{HeaderValue, Headers, PipelineError, Task};

use crate::transport::Envelope;

pub const CONTENT_TYPE_HEADER: &str = "contentType";
pub const JSON_CONTENT_TYPE: &str = "application/json";

pub fn to_envelope(
    task: &Task,
    queue: &str,
    accessor: Option<Headers>,
) -> Result<Envelope, PipelineError> {
    let body = task.to_body().map_err(|e| PipelineError::Serialization {
        queue: queue.to_string(),
        task_id: task.id.clone(),
        source: e,
    })?;

    let headers = match accessor {
        Some(headers) if headers.is_mutable() => headers,
        Some(snapshot) => snapshot.to_mutable(),
        None => Headers::new(),
    };

    let mut headers = headers.into_map();
    codec::clear(&mut headers);
    headers
        .entry(CONTENT_TYPE_HEADER.to_string())
        .or_insert_with(|| HeaderValue::from(JSON_CONTENT_TYPE));

    Ok(Envelope { body, headers })
}
