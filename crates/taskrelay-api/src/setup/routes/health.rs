//! Health check handlers.

use crate::state::AppState;
use axum::{http::StatusCode, response::IntoResponse, Json};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Run an async check with timeout; returns "ready", "timeout", or "{prefix}: {error}".
async fn run_check<F, E>(timeout: Duration, f: F, error_prefix: &str) -> String
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    match tokio::time::timeout(timeout, f).await {
        Ok(Ok(())) => "ready".to_string(),
        Ok(Err(e)) => format!("{}: {}", error_prefix, e),
        Err(_) => "timeout".to_string(),
    }
}

/// Liveness probe - process is running.
pub async fn liveness_check(_state: Arc<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "alive" })),
    )
}

/// Readiness probe - the queue transport answers a list call.
pub async fn readiness_check(state: Arc<AppState>) -> impl IntoResponse {
    let transport = state.transport.clone();
    let queue = run_check(
        CHECK_TIMEOUT,
        async move { transport.list_queues().await.map(drop) },
        "not_ready",
    )
    .await;

    let ready = queue == "ready";
    if !ready {
        tracing::error!(
            queue = %state.config.queue_name,
            status = %queue,
            "Queue transport readiness check failed"
        );
    }

    let status_code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(serde_json::json!({
            "status": if ready { "ready" } else { "not_ready" },
            "queue": queue,
            "queue_name": state.config.queue_name,
            "transport": state.config.queue_transport.to_string(),
        })),
    )
}
