//! Financial invariant validation
//!
//! Checks tariffs before they are used and calculation results after they
//! are produced. Findings are reported, never corrected: a failed check
//! yields a [`ValidationReport`] listing every violated invariant.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use core_kernel::{Clock, Money};

use crate::error::CoverageError;
use crate::model::InsuranceTariff;
use crate::results::{CalculationResult, SupplementaryCalculationResult};

/// Result of a validation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    /// A passing report
    pub fn ok() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    /// Builds a report from collected errors
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    /// Combines two reports
    pub fn merge(mut self, other: ValidationReport) -> Self {
        self.errors.extend(other.errors);
        self.is_valid = self.errors.is_empty();
        self
    }

    /// All errors separated by "; "
    pub fn joined_errors(&self) -> String {
        self.errors.join("; ")
    }

    /// Converts a failing report into `CoverageError::InvariantViolation`
    pub fn into_result(self) -> Result<(), CoverageError> {
        if self.is_valid {
            Ok(())
        } else {
            Err(CoverageError::InvariantViolation(self.errors))
        }
    }
}

/// Validates tariffs against financial and business invariants
#[derive(Clone)]
pub struct TariffValidator {
    share_tolerance: Decimal,
    clock: Arc<dyn Clock>,
}

impl TariffValidator {
    /// Creates a validator
    ///
    /// # Arguments
    ///
    /// * `share_tolerance` - Allowed |patient + insurer - price|
    /// * `clock` - Source of "now" for timestamp checks
    pub fn new(share_tolerance: Decimal, clock: Arc<dyn Clock>) -> Self {
        Self {
            share_tolerance,
            clock,
        }
    }

    /// Checks prices and shares
    pub fn validate_financial(&self, tariff: &InsuranceTariff) -> ValidationReport {
        let mut errors = Vec::new();
        let price = tariff.tariff_price;

        if !price.is_positive() {
            errors.push(format!("tariff price must be positive, got {}", price));
        }
        check_share("patient share", tariff.patient_share, price, &mut errors);
        check_share("insurer share", tariff.insurer_share, price, &mut errors);

        let difference = tariff
            .patient_share
            .checked_add(&tariff.insurer_share)
            .and_then(|sum| sum.checked_sub(&price));
        match difference {
            Ok(difference) if difference.abs().amount() <= self.share_tolerance => {}
            Ok(_) => errors.push(format!(
                "patient share {} plus insurer share {} does not equal tariff price {}",
                tariff.patient_share, tariff.insurer_share, price
            )),
            Err(_) => errors.push(format!(
                "patient share {} plus insurer share {} overflows",
                tariff.patient_share, tariff.insurer_share
            )),
        }

        if price.is_positive() {
            if let Ok(percent) = tariff.patient_share.percent_of(&price) {
                if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
                    errors.push(format!(
                        "patient share is {:.2}% of the tariff price, expected 0-100%",
                        percent
                    ));
                }
            }
        }

        if let Some(max_payment) = tariff.supplementary_max_payment {
            if max_payment.is_negative() {
                errors.push(format!(
                    "supplementary max payment must not be negative, got {}",
                    max_payment
                ));
            }
        }

        ValidationReport::from_errors(errors)
    }

    /// Checks uniqueness, timestamps and status flags
    ///
    /// `existing` holds the other tariffs of the same plan.
    pub fn validate_business(
        &self,
        tariff: &InsuranceTariff,
        existing: &[InsuranceTariff],
    ) -> ValidationReport {
        let mut errors = Vec::new();
        let now = self.clock.now();

        let duplicate = existing.iter().any(|other| {
            other.id != tariff.id
                && !other.is_deleted
                && other.plan_id == tariff.plan_id
                && other.service_id == tariff.service_id
        });
        if duplicate {
            errors.push(format!(
                "a tariff for plan {} and service {} already exists",
                tariff.plan_id, tariff.service_id
            ));
        }

        if tariff.created_at > now {
            errors.push("creation date is in the future".to_string());
        }
        if let Some(updated_at) = tariff.updated_at {
            if updated_at < tariff.created_at {
                errors.push("update date is before creation date".to_string());
            }
            if updated_at > now {
                errors.push("update date is in the future".to_string());
            }
        }

        if tariff.is_deleted && tariff.is_active {
            errors.push("deleted tariff must not be active".to_string());
        }

        ValidationReport::from_errors(errors)
    }

    /// Reports monetary fields carrying more than two decimal places
    pub fn validate_rounding(&self, tariff: &InsuranceTariff) -> ValidationReport {
        let fields = [
            ("tariff price", tariff.tariff_price),
            ("patient share", tariff.patient_share),
            ("insurer share", tariff.insurer_share),
        ];
        let errors = fields
            .iter()
            .filter(|(_, value)| !value.is_at_precision())
            .map(|(name, value)| format!("{} {} is not rounded to two decimal places", name, value.amount()))
            .collect();
        ValidationReport::from_errors(errors)
    }

    /// Runs every tariff check
    pub fn validate_all(
        &self,
        tariff: &InsuranceTariff,
        existing: &[InsuranceTariff],
    ) -> ValidationReport {
        self.validate_financial(tariff)
            .merge(self.validate_business(tariff, existing))
            .merge(self.validate_rounding(tariff))
    }
}

fn check_share(name: &str, share: Money, price: Money, errors: &mut Vec<String>) {
    if share.is_negative() {
        errors.push(format!("{} must not be negative, got {}", name, share));
    } else if share > price {
        errors.push(format!("{} {} exceeds tariff price {}", name, share, price));
    }
}

/// True when `a + b` equals `total`; an overflowing sum never does
fn sums_to(a: Money, b: Money, total: Money) -> bool {
    a.checked_add(&b).is_ok_and(|sum| sum == total)
}

/// Checks the invariants of a primary result
pub fn check_primary(result: &CalculationResult) -> ValidationReport {
    let mut errors = Vec::new();

    if result.insurance_coverage.is_negative() {
        errors.push(format!("insurance coverage {} is negative", result.insurance_coverage));
    }
    if result.insurance_coverage > result.coverable_amount {
        errors.push(format!(
            "insurance coverage {} exceeds coverable amount {}",
            result.insurance_coverage, result.coverable_amount
        ));
    }
    if result.patient_payment.is_negative() {
        errors.push(format!("patient payment {} is negative", result.patient_payment));
    }
    if !sums_to(result.deductible_amount, result.coverable_amount, result.total_amount) {
        errors.push(format!(
            "deductible {} plus coverable {} does not equal total {}",
            result.deductible_amount, result.coverable_amount, result.total_amount
        ));
    }
    if !sums_to(result.patient_payment, result.insurance_coverage, result.total_amount) {
        errors.push(format!(
            "patient payment {} plus coverage {} does not equal total {}",
            result.patient_payment, result.insurance_coverage, result.total_amount
        ));
    }

    ValidationReport::from_errors(errors)
}

/// Checks the invariants of a supplementary result
pub fn check_supplementary(result: &SupplementaryCalculationResult) -> ValidationReport {
    let mut errors = Vec::new();

    if result.supplementary_coverage.is_negative() {
        errors.push(format!(
            "supplementary coverage {} is negative",
            result.supplementary_coverage
        ));
    }
    if result.final_patient_share.is_negative() {
        errors.push(format!("final patient share {} is negative", result.final_patient_share));
    }
    if result.total_coverage > result.service_amount {
        errors.push(format!(
            "total coverage {} exceeds service amount {}",
            result.total_coverage, result.service_amount
        ));
    }
    if !sums_to(result.primary_coverage, result.supplementary_coverage, result.total_coverage) {
        errors.push(format!(
            "primary {} plus supplementary {} does not equal total coverage {}",
            result.primary_coverage, result.supplementary_coverage, result.total_coverage
        ));
    }
    if !result.is_fully_covered
        && !sums_to(result.total_coverage, result.final_patient_share, result.service_amount)
    {
        errors.push(format!(
            "total coverage {} plus final share {} does not equal service amount {}",
            result.total_coverage, result.final_patient_share, result.service_amount
        ));
    }

    ValidationReport::from_errors(errors)
}
