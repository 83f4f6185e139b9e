//! Serialisable result envelope
//!
//! `CalculationOutcome<T>` is what leaves the engine boundary: either
//! `{ "success": true, "data": ... }` or
//! `{ "success": false, "message": ..., "error_category": ... }`.

use serde::{Deserialize, Serialize};

use crate::error::{CoverageError, ErrorCategory};

/// Tagged success/failure envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationOutcome<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_category: Option<ErrorCategory>,
}

impl<T> CalculationOutcome<T> {
    /// Successful outcome
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error_category: None,
        }
    }

    /// Failed outcome
    pub fn failure(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
            error_category: Some(category),
        }
    }

    /// Converts the payload, keeping the failure details
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CalculationOutcome<U> {
        CalculationOutcome {
            success: self.success,
            data: self.data.map(f),
            message: self.message,
            error_category: self.error_category,
        }
    }
}

impl<T> From<CoverageError> for CalculationOutcome<T> {
    fn from(err: CoverageError) -> Self {
        Self::failure(err.category(), err.message())
    }
}

impl<T> From<Result<T, CoverageError>> for CalculationOutcome<T> {
    fn from(result: Result<T, CoverageError>) -> Self {
        match result {
            Ok(data) => Self::success(data),
            Err(err) => err.into(),
        }
    }
}
