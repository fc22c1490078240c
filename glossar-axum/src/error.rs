use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use glossar::GlossarError;
use serde_json::json;
use thiserror::Error;

/// Errors the login endpoints turn into HTTP responses.
///
/// Wrong credentials never end up here; they are answered with a redirect.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl From<GlossarError> for AppError {
    fn from(err: GlossarError) -> Self {
        match err {
            GlossarError::ValidationError(msg) => AppError::BadRequest(msg),
            GlossarError::AuthError(msg) | GlossarError::StorageError(msg) => {
                AppError::InternalError(msg)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::BadRequest(ref msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            AppError::InternalError(ref msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            AppError::Unavailable(ref msg) => {
                tracing::warn!(error = %msg, "Service unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, "Service unavailable")
            }
        };

        let body = Json(json!({
            "error": error_message,
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
