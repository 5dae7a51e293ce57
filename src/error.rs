use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;

pub enum AppError {
    /// Handling the request blew up (bad JSON, spawn failure, ...).
    Internal(anyhow::Error),
    /// The download job ran and exited unsuccessfully; carries its stderr.
    DownloadFailed(String),
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Internal(e) => {
                tracing::error!("Internal server error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))).into_response()
            }
            AppError::DownloadFailed(stderr) => {
                let body = json!({
                    "success": false,
                    "error": format!("Download failed: {}", stderr),
                });
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            AppError::BadRequest(e) => (StatusCode::BAD_REQUEST, Json(json!({ "error": e }))).into_response(),
        }
    }
}

// Lets `?` turn any error into `AppError::Internal`.
impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Internal(err.into())
    }
}
