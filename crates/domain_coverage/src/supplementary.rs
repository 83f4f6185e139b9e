//! Supplementary coverage calculation
//!
//! Supplementary insurance pays a share of what is left after primary
//! coverage, never a share of the original price:
//!
//! ```text
//! remaining      = amount - primary coverage
//! coverage       = min(round(remaining * percent / 100, 2), max payment)
//! final share    = max(0, remaining - coverage)
//! total coverage = primary coverage + coverage
//! ```

use chrono::NaiveDate;
use tracing::debug;

use core_kernel::{Money, Percentage};

use crate::error::CoverageError;
use crate::model::InsuranceTariff;
use crate::results::SupplementaryCalculationResult;

/// Calculates supplementary coverage on the remaining patient liability
///
/// When primary insurance already covers the full amount the tariff is not
/// consulted and may be absent.
///
/// # Errors
///
/// `NotFound` when there is a remaining liability but no tariff.
pub fn calculate_supplementary(
    amount: Money,
    primary_coverage: Money,
    tariff: Option<&InsuranceTariff>,
    calculation_date: NaiveDate,
) -> Result<SupplementaryCalculationResult, CoverageError> {
    let remaining = amount.checked_sub(&primary_coverage)?;
    if !remaining.is_positive() {
        return Ok(fully_covered(amount, primary_coverage, calculation_date));
    }

    let tariff = tariff.ok_or_else(|| {
        CoverageError::not_found("supplementary tariff not defined for this service")
    })?;

    let percent = tariff.supplementary_coverage_percent.unwrap_or(Percentage::ZERO);
    let mut coverage = remaining.apply_percent(percent)?;
    if let Some(max_payment) = tariff.supplementary_max_payment {
        coverage = coverage.min(max_payment.max_zero());
    }

    let final_patient_share = remaining.checked_sub(&coverage)?.max_zero();
    let total_coverage = primary_coverage.checked_add(&coverage)?;

    debug!(
        tariff_id = %tariff.id,
        remaining = %remaining,
        supplementary = %coverage,
        "Supplementary coverage calculated"
    );

    Ok(SupplementaryCalculationResult {
        service_amount: amount,
        primary_coverage,
        supplementary_coverage: coverage,
        final_patient_share,
        total_coverage,
        calculation_date,
        is_fully_covered: false,
    })
}

/// Result leaving the patient liable for everything primary does not cover
pub fn patient_liable(
    amount: Money,
    primary_coverage: Money,
    calculation_date: NaiveDate,
) -> Result<SupplementaryCalculationResult, CoverageError> {
    let remaining = amount.checked_sub(&primary_coverage)?.max_zero();
    if remaining.is_zero() {
        return Ok(fully_covered(amount, primary_coverage, calculation_date));
    }
    Ok(SupplementaryCalculationResult {
        service_amount: amount,
        primary_coverage,
        supplementary_coverage: Money::zero(),
        final_patient_share: remaining,
        total_coverage: primary_coverage,
        calculation_date,
        is_fully_covered: false,
    })
}

fn fully_covered(
    amount: Money,
    primary_coverage: Money,
    calculation_date: NaiveDate,
) -> SupplementaryCalculationResult {
    SupplementaryCalculationResult {
        service_amount: amount,
        primary_coverage,
        supplementary_coverage: Money::zero(),
        final_patient_share: Money::zero(),
        total_coverage: primary_coverage,
        calculation_date,
        is_fully_covered: true,
    }
}
