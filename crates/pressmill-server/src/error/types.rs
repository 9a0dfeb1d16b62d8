//! API error types.

use axum::http::StatusCode;
use thiserror::Error;

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// API error enum covering all error cases.
#[derive(Debug, Error)]
pub enum ApiError {
    // 400 Bad Request
    /// Malformed or incomplete request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    // 403 Forbidden
    /// Download attempted without a license key.
    #[error("You must provide a license key to download this plugin.")]
    LicenseRequired,

    /// Download attempted with a license key that does not verify.
    #[error("Sorry, your license is not valid.")]
    LicenseInvalid,

    // 404 Not Found
    /// The named resource does not exist.
    #[error("{0} not found")]
    NotFound(String),

    // 500 Internal Server Error
    /// Unexpected failure.
    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

impl ApiError {
    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::LicenseRequired | Self::LicenseInvalid => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get stable error code string for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::LicenseRequired => "license_required",
            Self::LicenseInvalid => "license_invalid",
            Self::NotFound(_) => "not_found",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Whether this is a server-side failure worth an error log.
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}
