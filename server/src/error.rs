//! JSON error responses
//!
//! Every failure leaves the server as `{ "success": false, "message": ... }`.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;
use tumorscan::TumorScanError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    /// Map a library error, using `fallback` as the message for server-side failures
    pub fn from_library(err: TumorScanError, fallback: &str) -> Self {
        if err.is_validation() {
            Self::bad_request(err.to_string())
        } else {
            error!("{}: {}", fallback, err);
            Self::internal(fallback)
        }
    }
}

impl From<TumorScanError> for ApiError {
    fn from(err: TumorScanError) -> Self {
        Self::from_library(err, "Internal server error")
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::bad_request(format!("Invalid multipart body: {}", err.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
