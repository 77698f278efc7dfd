use crate::error::{HttpAppError, ValidatedJson};
use axum::{extract::State, http::StatusCode, Extension};
use std::sync::Arc;

use crate::state::AppState;
use taskrelay_core::{NewTask, TraceContext};
use taskrelay_infra::ErrorResponse;

/// Submit a task for asynchronous processing
///
/// The task is enqueued under the request's trace; the response carries no body.
#[utoipa::path(
    post,
    path = "/task",
    tag = "tasks",
    request_body = NewTask,
    responses(
        (status = 202, description = "Task accepted and enqueued"),
        (status = 400, description = "Malformed task body", body = ErrorResponse),
        (status = 500, description = "Task could not be encoded", body = ErrorResponse),
        (status = 503, description = "Task queue unavailable", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(task_name = %task.name))]
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Extension(trace): Extension<TraceContext>,
    ValidatedJson(task): ValidatedJson<NewTask>,
) -> Result<StatusCode, HttpAppError> {
    let task = state.publisher.publish(task).await?;

    tracing::info!(
        task_id = %task.id,
        queue = %state.publisher.queue(),
        trace_id = %trace.trace_id_hex(),
        "Task accepted"
    );

    Ok(StatusCode::ACCEPTED)
}
