//! Rule evaluation DTOs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use domain_coverage::RuleType;

use super::positive_amount;

/// Evaluates the rules of one type for a calculation context
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RuleEvaluationRequest {
    #[validate(range(min = 1))]
    pub patient_id: i64,
    #[validate(range(min = 1))]
    pub service_id: i64,
    #[validate(custom(function = "positive_amount"))]
    pub service_amount: Decimal,
    pub rule_type: RuleType,
    pub calculation_date: Option<NaiveDate>,
}
