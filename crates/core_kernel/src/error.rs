//! Configuration errors
//!
//! Raised when settings loaded at startup cannot be used. Hosts treat these
//! as fatal before serving any calculation.

use std::fmt;
use thiserror::Error;

/// A configuration value outside its usable range
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: String },

    #[error("{field} must be at least 1")]
    Zero { field: &'static str },
}

impl ConfigError {
    pub fn negative(field: &'static str, value: impl fmt::Display) -> Self {
        ConfigError::Negative {
            field,
            value: value.to_string(),
        }
    }

    pub fn zero(field: &'static str) -> Self {
        ConfigError::Zero { field }
    }

    /// Name of the offending setting
    pub fn field(&self) -> &'static str {
        match self {
            ConfigError::Negative { field, .. } | ConfigError::Zero { field } => field,
        }
    }
}
