//! Coverage domain errors
//!
//! Every engine operation returns `Result<T, CoverageError>`; nothing is
//! allowed to panic across the crate boundary. Each variant belongs to one
//! [`ErrorCategory`], which is what callers branch on.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use core_kernel::{MoneyError, PortError, RuleId, TemporalError};
use crate::rules::RulesError;

/// Error category tag carried on failed outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed input: ids, amounts, dates, batch shapes
    Validation,
    /// Missing plan, tariff, policy or configuration
    NotFound,
    /// A rule could not be loaded or evaluated
    RuleEvaluation,
    /// A financial invariant does not hold
    InvariantViolation,
    /// Anything unexpected (data source failures, overflow)
    System,
}

impl ErrorCategory {
    /// Stable tag used in logs and monitoring events
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Validation => "validation",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::RuleEvaluation => "rule_evaluation",
            ErrorCategory::InvariantViolation => "invariant_violation",
            ErrorCategory::System => "system",
        }
    }
}

/// Errors that can occur in the coverage domain
#[derive(Debug, Error)]
pub enum CoverageError {
    /// Input failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// A required record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A payment-limit rule rejected the service amount
    #[error("Payment limit exceeded: service amount {amount} exceeds limit {limit} (rule {rule_id})")]
    PaymentLimitExceeded {
        rule_id: RuleId,
        amount: Decimal,
        limit: Decimal,
    },

    /// A rule failed to load or evaluate
    #[error("Rule evaluation error: {0}")]
    Rules(#[from] RulesError),

    /// Calculated figures break a financial invariant
    #[error("Invariant violation: {}", .0.join("; "))]
    InvariantViolation(Vec<String>),

    /// Monetary arithmetic failed
    #[error("Financial error: {0}")]
    Money(#[from] MoneyError),

    /// Date arithmetic failed
    #[error("Temporal error: {0}")]
    Temporal(#[from] TemporalError),

    /// A data source failed
    #[error("Data source error: {0}")]
    Port(#[from] PortError),

    /// Unexpected failure surfaced with a generic message
    #[error("System error: {0}")]
    System(String),
}

impl CoverageError {
    /// Creates a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        CoverageError::Validation(message.into())
    }

    /// Creates a not-found error
    pub fn not_found(message: impl Into<String>) -> Self {
        CoverageError::NotFound(message.into())
    }

    /// Creates a system error
    pub fn system(message: impl Into<String>) -> Self {
        CoverageError::System(message.into())
    }

    /// Returns the category of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            CoverageError::Validation(_)
            | CoverageError::PaymentLimitExceeded { .. }
            | CoverageError::Temporal(_) => ErrorCategory::Validation,
            CoverageError::NotFound(_) => ErrorCategory::NotFound,
            CoverageError::Rules(_) => ErrorCategory::RuleEvaluation,
            CoverageError::InvariantViolation(_) => ErrorCategory::InvariantViolation,
            CoverageError::Money(_) | CoverageError::Port(_) | CoverageError::System(_) => {
                ErrorCategory::System
            }
        }
    }

    /// Human-readable message without the category prefix
    pub fn message(&self) -> String {
        match self {
            CoverageError::Validation(msg)
            | CoverageError::NotFound(msg)
            | CoverageError::System(msg) => msg.clone(),
            CoverageError::InvariantViolation(errors) => errors.join("; "),
            CoverageError::Rules(err) => err.to_string(),
            CoverageError::Money(err) => err.to_string(),
            CoverageError::Temporal(err) => err.to_string(),
            CoverageError::Port(err) => err.to_string(),
            CoverageError::PaymentLimitExceeded { amount, limit, .. } => {
                format!("service amount {} exceeds payment limit {}", amount, limit)
            }
        }
    }
}
