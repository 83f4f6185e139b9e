//! Request/response data transfer objects

pub mod calculation;
pub mod rules;

use rust_decimal::Decimal;
use validator::ValidationError;

/// Rejects zero and negative amounts
pub(crate) fn positive_amount(value: &Decimal) -> Result<(), ValidationError> {
    if *value > Decimal::ZERO {
        Ok(())
    } else {
        Err(ValidationError::new("amount_not_positive"))
    }
}

/// Rejects negative amounts
pub(crate) fn non_negative_amount(value: &Decimal) -> Result<(), ValidationError> {
    if *value >= Decimal::ZERO {
        Ok(())
    } else {
        Err(ValidationError::new("amount_negative"))
    }
}
