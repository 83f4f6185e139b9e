//! Primary coverage calculation
//!
//! ```text
//! deductible applied = min(deductible, total)
//! coverable          = total - deductible applied
//! coverage           = round(coverable * percent / 100, 2), capped at max payment
//! patient payment    = deductible applied + coverable - coverage
//! ```
//!
//! Both functions are pure: the same inputs always produce the same result.

use serde::{Deserialize, Serialize};

use core_kernel::{Money, Percentage, RuleId};

use crate::error::CoverageError;
use crate::model::{InsurancePlan, PlanService};
use crate::results::CalculationResult;

/// Coverage parameters after plan defaults and rule overrides are resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageParameters {
    pub deductible: Money,
    pub coverage_percent: Percentage,
    /// Ceiling on the insurer's payment
    pub max_payment: Option<Money>,
    pub applied_rule: Option<RuleId>,
}

impl CoverageParameters {
    /// Parameters taken from a plan and its optional service override
    pub fn from_plan(plan: &InsurancePlan, plan_service: Option<&PlanService>) -> Self {
        Self {
            deductible: plan.deductible,
            coverage_percent: plan_service
                .and_then(|ps| ps.coverage_override)
                .unwrap_or(plan.coverage_percent),
            max_payment: None,
            applied_rule: None,
        }
    }
}

/// Calculates primary coverage from plan-level parameters
///
/// # Errors
///
/// * `NotFound("insurance not found")` when `plan` is absent
/// * `NotFound("configuration not found")` when the plan excludes the service
/// * `Validation` when `amount` is negative
/// * `Money` when an intermediate figure overflows
pub fn calculate_coverage(
    amount: Money,
    plan: Option<&InsurancePlan>,
    plan_service: Option<&PlanService>,
) -> Result<CalculationResult, CoverageError> {
    let plan = plan.ok_or_else(|| CoverageError::not_found("insurance not found"))?;
    if plan_service.is_some_and(|ps| !ps.is_covered) {
        return Err(CoverageError::not_found("configuration not found"));
    }
    calculate_with_parameters(amount, &CoverageParameters::from_plan(plan, plan_service))
}

/// Calculates primary coverage from explicit parameters
pub fn calculate_with_parameters(
    amount: Money,
    parameters: &CoverageParameters,
) -> Result<CalculationResult, CoverageError> {
    if amount.is_negative() {
        return Err(CoverageError::validation(format!(
            "service amount must not be negative, got {}",
            amount
        )));
    }

    let deductible_amount = parameters.deductible.max_zero().min(amount);
    let coverable_amount = amount.checked_sub(&deductible_amount)?.max_zero();

    let mut insurance_coverage = coverable_amount.apply_percent(parameters.coverage_percent)?;
    if let Some(max_payment) = parameters.max_payment {
        insurance_coverage = insurance_coverage.min(max_payment.max_zero());
    }

    let patient_payment = deductible_amount
        .checked_add(&coverable_amount)?
        .checked_sub(&insurance_coverage)?;

    Ok(CalculationResult {
        total_amount: amount,
        deductible_amount,
        coverable_amount,
        coverage_percent: parameters.coverage_percent,
        insurance_coverage,
        patient_payment,
        applied_rule: parameters.applied_rule,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InsuranceType;
    use core_kernel::{PlanId, ServiceId, ValidityWindow};
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn plan(percent: Decimal, deductible: Decimal) -> InsurancePlan {
        InsurancePlan {
            id: PlanId::new(1),
            name: "Basic".to_string(),
            insurance_type: InsuranceType::Primary,
            coverage_percent: Percentage::new(percent).unwrap(),
            deductible: Money::new(deductible),
            validity: ValidityWindow::unbounded(),
            is_active: true,
        }
    }

    #[test]
    fn test_seventy_percent_no_deductible() {
        let result = calculate_coverage(Money::new(dec!(1000000)), Some(&plan(dec!(70), dec!(0))), None).unwrap();
        assert_eq!(result.insurance_coverage.amount(), dec!(700000));
        assert_eq!(result.patient_payment.amount(), dec!(300000));
        assert_eq!(result.coverable_amount.amount(), dec!(1000000));
    }

    #[test]
    fn test_deductible_applied_first() {
        let result = calculate_coverage(Money::new(dec!(1000)), Some(&plan(dec!(80), dec!(100))), None).unwrap();
        assert_eq!(result.deductible_amount.amount(), dec!(100));
        assert_eq!(result.coverable_amount.amount(), dec!(900));
        assert_eq!(result.insurance_coverage.amount(), dec!(720));
        assert_eq!(result.patient_payment.amount(), dec!(280));
    }

    #[test]
    fn test_deductible_larger_than_amount() {
        let result = calculate_coverage(Money::new(dec!(40)), Some(&plan(dec!(80), dec!(100))), None).unwrap();
        assert_eq!(result.deductible_amount.amount(), dec!(40));
        assert!(result.coverable_amount.is_zero());
        assert!(result.insurance_coverage.is_zero());
        assert_eq!(result.patient_payment.amount(), dec!(40));
    }

    #[test]
    fn test_missing_plan() {
        let err = calculate_coverage(Money::new(dec!(10)), None, None).unwrap_err();
        assert_eq!(err.message(), "insurance not found");
    }

    #[test]
    fn test_excluded_service() {
        let excluded = PlanService {
            plan_id: PlanId::new(1),
            service_id: ServiceId::new(5),
            coverage_override: None,
            is_covered: false,
        };
        let err = calculate_coverage(Money::new(dec!(10)), Some(&plan(dec!(70), dec!(0))), Some(&excluded))
            .unwrap_err();
        assert_eq!(err.message(), "configuration not found");
    }

    #[test]
    fn test_max_payment_caps_coverage() {
        let params = CoverageParameters {
            deductible: Money::zero(),
            coverage_percent: Percentage::new(dec!(90)).unwrap(),
            max_payment: Some(Money::new(dec!(500))),
            applied_rule: Some(RuleId::new(4)),
        };
        let result = calculate_with_parameters(Money::new(dec!(1000)), &params).unwrap();
        assert_eq!(result.insurance_coverage.amount(), dec!(500));
        assert_eq!(result.patient_payment.amount(), dec!(500));
        assert_eq!(result.applied_rule, Some(RuleId::new(4)));
    }

    #[test]
    fn test_negative_amount_rejected() {
        let params = CoverageParameters::from_plan(&plan(dec!(70), dec!(0)), None);
        assert!(calculate_with_parameters(Money::new(dec!(-1)), &params).is_err());
    }

    #[test]
    fn test_amount_too_large_to_scale_is_a_money_error() {
        let err = calculate_coverage(Money::new(Decimal::MAX), Some(&plan(dec!(70), dec!(0))), None)
            .unwrap_err();
        assert!(matches!(err, CoverageError::Money(_)));
    }

    proptest! {
        #[test]
        fn prop_coverage_within_bounds(
            cents in 0i64..1_000_000_000,
            percent in 0u32..=100,
            deductible_cents in 0i64..100_000_000,
        ) {
            let p = plan(Decimal::from(percent), Decimal::new(deductible_cents, 2));
            let amount = Money::from_minor(cents);
            let result = calculate_coverage(amount, Some(&p), None).unwrap();

            prop_assert!(!result.insurance_coverage.is_negative());
            prop_assert!(result.insurance_coverage <= result.coverable_amount);
            prop_assert!(!result.patient_payment.is_negative());
            prop_assert_eq!(result.patient_payment.checked_add(&result.insurance_coverage).unwrap(), amount);
        }

        #[test]
        fn prop_idempotent(cents in 0i64..1_000_000_000, percent in 0u32..=100) {
            let p = plan(Decimal::from(percent), dec!(25));
            let amount = Money::from_minor(cents);
            prop_assert_eq!(
                calculate_coverage(amount, Some(&p), None).unwrap(),
                calculate_coverage(amount, Some(&p), None).unwrap()
            );
        }
    }
}
