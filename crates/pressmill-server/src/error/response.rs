//! Error response implementation.

use super::types::ApiError;
use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            error!(error = %self, code = self.error_code(), "Server error occurred");
        } else if matches!(self, ApiError::LicenseRequired | ApiError::LicenseInvalid) {
            warn!(error = %self, code = self.error_code(), "License rejected");
        }

        let status = self.status_code();
        let code = self.error_code();

        let message = match &self {
            ApiError::Internal(err) => {
                // Don't expose internal error details in production.
                if cfg!(debug_assertions) {
                    format!("{}: {}", self, err)
                } else {
                    "An internal error occurred".to_string()
                }
            }
            _ => self.to_string(),
        };

        let body = ErrorResponse {
            success: false,
            error: ErrorBody { code, message },
        };

        (status, Json(body)).into_response()
    }
}
