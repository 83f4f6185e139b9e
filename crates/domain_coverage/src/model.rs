//! Coverage data model
//!
//! Records supplied by the plan catalog and patient registry. The engine
//! treats all of them as read-only values.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{
    Money, MoneyError, PatientId, PatientInsuranceId, Percentage, PlanId, ServiceCategoryId,
    ServiceId, TariffId, ValidityWindow,
};

/// Whether a plan or tariff belongs to primary or supplementary insurance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsuranceType {
    /// Base insurance, applied first
    Primary,
    /// Secondary insurance covering part of the remaining liability
    Supplementary,
}

/// Patient gender as recorded by the patient registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    #[serde(alias = "M", alias = "m")]
    Male,
    #[serde(alias = "F", alias = "f")]
    Female,
    #[serde(alias = "O", alias = "o")]
    Other,
}

impl std::str::FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Ok(Gender::Male),
            "female" | "f" => Ok(Gender::Female),
            "other" | "o" => Ok(Gender::Other),
            other => Err(format!("unknown gender '{}'", other)),
        }
    }
}

/// An insurance plan with its default coverage parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsurancePlan {
    pub id: PlanId,
    pub name: String,
    pub insurance_type: InsuranceType,
    /// Share of the coverable amount paid by the insurer
    pub coverage_percent: Percentage,
    /// Fixed amount the patient pays before percentage coverage applies
    pub deductible: Money,
    #[serde(default)]
    pub validity: ValidityWindow,
    pub is_active: bool,
}

impl InsurancePlan {
    /// Returns true if the plan is active and valid on `date`
    pub fn is_effective_on(&self, date: NaiveDate) -> bool {
        self.is_active && self.validity.contains(date)
    }
}

/// Plan-level configuration of a single service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanService {
    pub plan_id: PlanId,
    pub service_id: ServiceId,
    /// Replaces the plan's coverage percent for this service
    pub coverage_override: Option<Percentage>,
    /// False when the plan explicitly excludes the service
    #[serde(default = "default_true")]
    pub is_covered: bool,
}

fn default_true() -> bool {
    true
}

/// A billable medical service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalService {
    pub id: ServiceId,
    pub name: String,
    pub category_id: ServiceCategoryId,
    pub base_price: Money,
}

/// Patient attributes that business rules may condition on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub id: PatientId,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<Gender>,
}

/// Enrollment of a patient in a plan
///
/// Policies are deactivated, never deleted, when replaced or expired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientInsurance {
    pub id: PatientInsuranceId,
    pub patient_id: PatientId,
    pub plan_id: PlanId,
    pub policy_number: String,
    pub is_primary: bool,
    pub start_date: NaiveDate,
    /// `None` means open-ended
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
}

impl PatientInsurance {
    /// Returns true if the policy is active and covers `date`
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.is_active && date >= self.start_date && self.end_date.map_or(true, |end| date <= end)
    }

    /// Marks the policy inactive
    pub fn deactivate(&mut self) {
        self.is_active = false;
    }
}

/// Price and coverage-share configuration for a (plan, service) pair
///
/// A tariff whose `service_id` is [`ServiceId::WILDCARD`] applies to every
/// service of its plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsuranceTariff {
    pub id: TariffId,
    pub plan_id: PlanId,
    pub service_id: ServiceId,
    pub insurance_type: InsuranceType,
    pub tariff_price: Money,
    pub patient_share: Money,
    pub insurer_share: Money,
    /// Supplementary tariffs only: share of the remaining liability covered
    #[serde(default)]
    pub supplementary_coverage_percent: Option<Percentage>,
    /// Supplementary tariffs only: ceiling on the supplementary payment
    #[serde(default)]
    pub supplementary_max_payment: Option<Money>,
    pub is_active: bool,
    #[serde(default)]
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl InsuranceTariff {
    /// Creates a primary tariff whose shares are split from `insurer_percent`
    pub fn primary(
        id: TariffId,
        plan_id: PlanId,
        service_id: ServiceId,
        tariff_price: Money,
        insurer_percent: Percentage,
        created_at: DateTime<Utc>,
    ) -> Result<Self, MoneyError> {
        let (patient_share, insurer_share) = split_shares(tariff_price, insurer_percent)?;
        Ok(Self {
            id,
            plan_id,
            service_id,
            insurance_type: InsuranceType::Primary,
            tariff_price,
            patient_share,
            insurer_share,
            supplementary_coverage_percent: None,
            supplementary_max_payment: None,
            is_active: true,
            is_deleted: false,
            created_at,
            updated_at: None,
        })
    }

    /// Creates a supplementary tariff
    pub fn supplementary(
        id: TariffId,
        plan_id: PlanId,
        service_id: ServiceId,
        tariff_price: Money,
        coverage_percent: Percentage,
        max_payment: Option<Money>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, MoneyError> {
        let (patient_share, insurer_share) = split_shares(tariff_price, coverage_percent)?;
        Ok(Self {
            id,
            plan_id,
            service_id,
            insurance_type: InsuranceType::Supplementary,
            tariff_price,
            patient_share,
            insurer_share,
            supplementary_coverage_percent: Some(coverage_percent),
            supplementary_max_payment: max_payment,
            is_active: true,
            is_deleted: false,
            created_at,
            updated_at: None,
        })
    }

    /// Returns true if this tariff may be used in a calculation
    pub fn is_usable(&self) -> bool {
        self.is_active && !self.is_deleted
    }

    /// Returns true if the tariff prices `service_id` (exactly or as wildcard)
    pub fn applies_to(&self, service_id: ServiceId) -> bool {
        self.service_id == service_id || self.service_id.is_wildcard()
    }
}

/// Splits a price into (patient share, insurer share)
///
/// The insurer share is rounded and the patient share takes the remainder,
/// so the two always add up to the price exactly.
pub fn split_shares(price: Money, insurer_percent: Percentage) -> Result<(Money, Money), MoneyError> {
    let insurer = price.apply_percent(insurer_percent)?;
    Ok((price.checked_sub(&insurer)?, insurer))
}

/// Derives a tariff price from a base price and multiplicative factors
///
/// The result is rounded to whole currency units.
pub fn derive_tariff_price(base_price: Money, factors: &[Decimal]) -> Result<Money, MoneyError> {
    factors
        .iter()
        .try_fold(base_price, |price, factor| price.multiply(*factor))
        .map(|price| price.round_to_unit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_policy_open_ended() {
        let policy = PatientInsurance {
            id: PatientInsuranceId::new(1),
            patient_id: PatientId::new(1),
            plan_id: PlanId::new(1),
            policy_number: "P-1".to_string(),
            is_primary: true,
            start_date: date(2024, 1, 1),
            end_date: None,
            is_active: true,
        };
        assert!(policy.is_active_on(date(2030, 1, 1)));
        assert!(!policy.is_active_on(date(2023, 12, 31)));
    }

    #[test]
    fn test_split_shares_sum_to_price() {
        let (patient, insurer) =
            split_shares(Money::new(dec!(1000.01)), Percentage::new(dec!(70)).unwrap()).unwrap();
        assert_eq!(insurer.amount(), dec!(700.01));
        assert_eq!(patient.amount(), dec!(300.00));
        assert_eq!(patient.checked_add(&insurer).unwrap().amount(), dec!(1000.01));
    }

    #[test]
    fn test_split_shares_of_huge_price_is_an_error() {
        let percent = Percentage::new(dec!(70)).unwrap();
        assert_eq!(
            split_shares(Money::new(Decimal::MAX), percent),
            Err(MoneyError::Overflow)
        );
        assert!(InsuranceTariff::primary(
            TariffId::new(1),
            PlanId::new(1),
            ServiceId::new(10),
            Money::new(Decimal::MAX),
            percent,
            Utc::now(),
        )
        .is_err());
    }

    #[test]
    fn test_derive_tariff_price_rounds_to_unit() {
        let price = derive_tariff_price(Money::new(dec!(12500)), &[dec!(1.15), dec!(0.987)]).unwrap();
        // 12500 * 1.15 * 0.987 = 14188.125
        assert_eq!(price.amount(), dec!(14188));
    }

    #[test]
    fn test_gender_parsing() {
        assert_eq!("F".parse::<Gender>().unwrap(), Gender::Female);
        assert_eq!(" male ".parse::<Gender>().unwrap(), Gender::Male);
        assert!("x".parse::<Gender>().is_err());
    }
}
