//! Calculation result values
//!
//! All results are created fresh per call and owned by the caller.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use core_kernel::{Money, MoneyError, PatientId, Percentage, PlanId, RuleId, ServiceId};

/// Outcome of the primary coverage calculation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationResult {
    pub total_amount: Money,
    /// Deductible actually applied (never more than the total)
    pub deductible_amount: Money,
    /// max(0, total - deductible)
    pub coverable_amount: Money,
    pub coverage_percent: Percentage,
    pub insurance_coverage: Money,
    pub patient_payment: Money,
    /// Rule that supplied the coverage parameters, if any
    pub applied_rule: Option<RuleId>,
}

/// Outcome of the supplementary coverage calculation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplementaryCalculationResult {
    pub service_amount: Money,
    pub primary_coverage: Money,
    pub supplementary_coverage: Money,
    pub final_patient_share: Money,
    /// primary + supplementary
    pub total_coverage: Money,
    pub calculation_date: NaiveDate,
    /// True when primary insurance alone covers the full amount
    pub is_fully_covered: bool,
}

impl SupplementaryCalculationResult {
    /// Remaining liability after primary coverage, before supplementary
    pub fn remaining_after_primary(&self) -> Result<Money, MoneyError> {
        self.service_amount
            .checked_sub(&self.primary_coverage)
            .map(|remaining| remaining.max_zero())
    }
}

/// Aggregate result of primary plus (optional) supplementary coverage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedCalculationResult {
    pub patient_id: PatientId,
    pub service_id: ServiceId,
    pub service_amount: Money,
    pub calculation_date: NaiveDate,
    pub primary_plan_id: PlanId,
    pub supplementary_plan_id: Option<PlanId>,
    pub primary: CalculationResult,
    pub supplementary_coverage_percent: Option<Percentage>,
    pub supplementary_coverage: Money,
    pub total_coverage: Money,
    pub final_patient_share: Money,
    pub is_fully_covered: bool,
    /// Human-readable summary, e.g. "Primary: 70.0%, Supplementary: 90.0%"
    pub breakdown: String,
}

impl CombinedCalculationResult {
    /// Result when no supplementary insurance applies
    pub fn primary_only(
        patient_id: PatientId,
        service_id: ServiceId,
        calculation_date: NaiveDate,
        primary_plan_id: PlanId,
        primary: CalculationResult,
    ) -> Self {
        Self {
            patient_id,
            service_id,
            service_amount: primary.total_amount,
            calculation_date,
            primary_plan_id,
            supplementary_plan_id: None,
            supplementary_coverage_percent: None,
            supplementary_coverage: Money::zero(),
            total_coverage: primary.insurance_coverage,
            final_patient_share: primary.patient_payment,
            is_fully_covered: primary.patient_payment.is_zero(),
            breakdown: format!("Primary: {}", primary.coverage_percent),
            primary,
        }
    }

    /// Result combining primary and supplementary coverage
    #[allow(clippy::too_many_arguments)]
    pub fn with_supplementary(
        patient_id: PatientId,
        service_id: ServiceId,
        calculation_date: NaiveDate,
        primary_plan_id: PlanId,
        primary: CalculationResult,
        supplementary_plan_id: PlanId,
        supplementary_coverage_percent: Option<Percentage>,
        supplementary: &SupplementaryCalculationResult,
    ) -> Self {
        let breakdown = match supplementary_coverage_percent {
            Some(percent) => format!(
                "Primary: {}, Supplementary: {}",
                primary.coverage_percent, percent
            ),
            None => format!(
                "Primary: {}, Supplementary: no tariff for this service",
                primary.coverage_percent
            ),
        };

        Self {
            patient_id,
            service_id,
            service_amount: primary.total_amount,
            calculation_date,
            primary_plan_id,
            supplementary_plan_id: Some(supplementary_plan_id),
            supplementary_coverage_percent,
            supplementary_coverage: supplementary.supplementary_coverage,
            total_coverage: supplementary.total_coverage,
            final_patient_share: supplementary.final_patient_share,
            is_fully_covered: supplementary.is_fully_covered,
            breakdown,
            primary,
        }
    }
}
