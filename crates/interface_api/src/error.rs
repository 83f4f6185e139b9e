//! API error handling

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use domain_coverage::{CalculationOutcome, CoverageError, ErrorCategory};

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    /// The engine rejected or failed the request
    #[error(transparent)]
    Coverage(#[from] CoverageError),

    /// The request body did not pass shape checks
    #[error("Validation error: {0}")]
    Validation(String),

    /// The request body could not be parsed
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    /// Category reported in the failure envelope
    pub fn category(&self) -> ErrorCategory {
        match self {
            ApiError::Coverage(err) => err.category(),
            ApiError::Validation(_) | ApiError::BadRequest(_) => ErrorCategory::Validation,
        }
    }

    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => status_for(self.category()),
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Coverage(err) => err.message(),
            ApiError::Validation(msg) | ApiError::BadRequest(msg) => msg.clone(),
        }
    }
}

/// Maps an error category to its HTTP status
pub fn status_for(category: ErrorCategory) -> StatusCode {
    match category {
        ErrorCategory::Validation
        | ErrorCategory::RuleEvaluation
        | ErrorCategory::InvariantViolation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCategory::NotFound => StatusCode::NOT_FOUND,
        ErrorCategory::System => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        let body: CalculationOutcome<()> = CalculationOutcome::failure(self.category(), self.message());
        (status, Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::Validation(errors.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
