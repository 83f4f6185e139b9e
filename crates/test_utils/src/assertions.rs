//! Custom Test Assertions
//!
//! Provides specialized assertion helpers for coverage types that give
//! more meaningful error messages than standard assertions.

use core_kernel::Money;
use domain_coverage::{
    check_primary, check_supplementary, CalculationResult, CombinedCalculationResult,
    InsuranceTariff, SupplementaryCalculationResult,
};
use rust_decimal::Decimal;

/// Asserts that two Money values are approximately equal within a tolerance
///
/// # Panics
///
/// Panics if the amounts differ by more than tolerance
pub fn assert_money_approx_eq(actual: &Money, expected: &Money, tolerance: Decimal) {
    let diff = (actual.amount() - expected.amount()).abs();
    assert!(
        diff <= tolerance,
        "Money amounts differ by more than tolerance: actual={}, expected={}, diff={}, tolerance={}",
        actual.amount(),
        expected.amount(),
        diff,
        tolerance
    );
}

/// Asserts that a Money value equals a decimal amount
pub fn assert_money_eq(actual: &Money, expected: Decimal) {
    assert_eq!(
        actual.amount(),
        expected,
        "Expected money amount {}, got {}",
        expected,
        actual.amount()
    );
}

/// Asserts that a Money value is zero
pub fn assert_money_zero(money: &Money) {
    assert!(money.is_zero(), "Expected zero money, got {}", money.amount());
}

/// Asserts that a tariff's shares add up to its price within tolerance
pub fn assert_shares_sum_to_price(tariff: &InsuranceTariff, tolerance: Decimal) {
    let diff = (tariff.patient_share.amount() + tariff.insurer_share.amount()
        - tariff.tariff_price.amount())
    .abs();
    assert!(
        diff <= tolerance,
        "Tariff {} shares {} + {} differ from price {} by {}",
        tariff.id,
        tariff.patient_share,
        tariff.insurer_share,
        tariff.tariff_price,
        diff
    );
}

/// Asserts every invariant of a primary result
pub fn assert_primary_invariants(result: &CalculationResult) {
    let report = check_primary(result);
    assert!(report.is_valid, "Primary result invariants violated: {}", report.joined_errors());
}

/// Asserts every invariant of a supplementary result
pub fn assert_supplementary_invariants(result: &SupplementaryCalculationResult) {
    let report = check_supplementary(result);
    assert!(
        report.is_valid,
        "Supplementary result invariants violated: {}",
        report.joined_errors()
    );
}

/// Asserts the headline figures of a combined result
pub fn assert_combined(
    result: &CombinedCalculationResult,
    total_coverage: Decimal,
    final_patient_share: Decimal,
) {
    assert_eq!(
        result.total_coverage.amount(),
        total_coverage,
        "Total coverage mismatch ({})",
        result.breakdown
    );
    assert_eq!(
        result.final_patient_share.amount(),
        final_patient_share,
        "Final patient share mismatch ({})",
        result.breakdown
    );
    assert_eq!(
        result.total_coverage.checked_add(&result.final_patient_share),
        Ok(result.service_amount),
        "Coverage and patient share must add up to the service amount"
    );
}
