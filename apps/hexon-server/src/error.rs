//! Error types for the HEXON server

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hexon_core::HexonError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Core(#[from] HexonError),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        ServerError::Core(HexonError::InvalidRequest(msg.into()))
    }

    /// The `errorKind` string reported to clients
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::Core(err) => err.kind().as_str(),
            ServerError::Timeout(_) => "Timeout",
            ServerError::Internal(_) => "Internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Core(err) => match err {
                HexonError::ParseError(_)
                | HexonError::InvalidRange(_)
                | HexonError::InvalidRequest(_)
                | HexonError::UnsupportedInput(_)
                | HexonError::MergeError(_) => StatusCode::BAD_REQUEST,
                HexonError::ConversionUnavailable(_) => StatusCode::NOT_IMPLEMENTED,
                HexonError::ConversionFailed(_) => StatusCode::BAD_GATEWAY,
                HexonError::SerializeError(_) | HexonError::PartialSplitFailure { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ServerError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<MultipartError> for ServerError {
    fn from(err: MultipartError) -> Self {
        ServerError::invalid_request(format!("Malformed upload: {}", err.body_text()))
    }
}

/// Error response body
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    success: bool,
    error_kind: &'static str,
    message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(kind = self.kind(), "{}", self);
        }

        let body = ErrorResponse {
            success: false,
            error_kind: self.kind(),
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
