//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`. Pipeline failures convert
//! with `?` and render as [`ErrorResponse`] with the status from [`ErrorMetadata`].

use axum::{
    extract::rejection::JsonRejection,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use taskrelay_core::{ErrorMetadata, LogLevel, PipelineError};
use taskrelay_infra::ErrorResponse;

/// Wrapper so `IntoResponse` can be implemented for errors defined in other crates.
#[derive(Debug)]
pub enum HttpAppError {
    Pipeline(PipelineError),
    /// The request body could not be bound to the expected JSON shape.
    InvalidBody(String),
}

impl From<PipelineError> for HttpAppError {
    fn from(err: PipelineError) -> Self {
        HttpAppError::Pipeline(err)
    }
}

/// Convert JSON body deserialization failures into a 400 with our ErrorResponse format.
impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        HttpAppError::InvalidBody(format!("Invalid request body: {}", rejection.body_text()))
    }
}

/// JSON body extractor that returns our ErrorResponse format (400 + JSON) on deserialization failure.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(inner) = Json::<T>::from_request(req, state)
            .await
            .map_err(HttpAppError::from)?;
        Ok(ValidatedJson(inner))
    }
}

fn log_error(error: &PipelineError) {
    let queue = error.queue();
    let code = error.error_code();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, queue = %queue, code = code, "Request failed");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, queue = %queue, code = code, "Request failed");
        }
        LogLevel::Error => {
            tracing::error!(
                error = %error.detailed_message(),
                queue = %queue,
                code = code,
                "Request failed"
            );
        }
    }
}

fn is_production_env() -> bool {
    std::env::var("ENVIRONMENT")
        .or_else(|_| std::env::var("APP_ENV"))
        .map(|env| env.to_lowercase() == "production" || env.to_lowercase() == "prod")
        .unwrap_or(false)
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        match self {
            HttpAppError::InvalidBody(message) => {
                tracing::debug!(error = %message, "Rejected request body");
                (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse::new(message, "INVALID_REQUEST_BODY", false)),
                )
                    .into_response()
            }
            HttpAppError::Pipeline(err) => {
                let status = StatusCode::from_u16(err.http_status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

                log_error(&err);

                let mut body = ErrorResponse::new(
                    err.client_message(),
                    err.error_code(),
                    err.is_recoverable(),
                );
                // Error chains name queues and message ids; keep them out of production responses.
                if !is_production_env() {
                    body = body.with_details(err.detailed_message());
                }

                (status, Json(body)).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskrelay_core::TraceError;

    fn status_of(err: HttpAppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_transport_failure_is_service_unavailable() {
        let err = PipelineError::Transport {
            queue: "dev-task.std".to_string(),
            source: "connection refused".into(),
        };
        assert_eq!(status_of(err.into()), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_no_active_trace_is_internal_error() {
        let err = PipelineError::Trace {
            queue: "dev-task.std".to_string(),
            source: TraceError::NoActiveTrace,
        };
        assert_eq!(status_of(err.into()), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_invalid_body_is_bad_request() {
        let err = HttpAppError::InvalidBody("Invalid request body: EOF".to_string());
        assert_eq!(status_of(err), StatusCode::BAD_REQUEST);
    }
}
