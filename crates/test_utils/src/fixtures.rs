//! Pre-built Test Fixtures
//!
//! Provides ready-to-use coverage data. Every fixture is dated relative to
//! [`TemporalFixtures::today`] so tests stay deterministic.
//!
//! # Standard catalog
//!
//! | patient | primary plan      | supplementary plan |
//! |---------|-------------------|--------------------|
//! | 1       | 1 (70%)           | 2 (90%)            |
//! | 2       | 1 (70%)           | none               |
//! | 3       | none              | none               |
//! | 4       | 3 (100%)          | 2 (90%)            |
//!
//! Services 10 and 11 have primary tariffs in plan 1; service 12 has none.
//! Plan 2 covers service 11 with a 100,000 ceiling.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use core_kernel::{
    FixedClock, Money, PatientId, PatientInsuranceId, Percentage, PlanId, ServiceCategoryId,
    ServiceId, TariffId, ValidityWindow,
};
use domain_coverage::{
    Gender, InMemoryCoverageStore, InsurancePlan, InsuranceTariff, InsuranceType, MedicalService,
    PatientInsurance, PatientProfile,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

/// Fixture for dates and clocks
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// The fixed "today" of every fixture (June 1, 2024)
    pub fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    /// Start of the fixture policies (Jan 1, 2024)
    pub fn policy_start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    /// Creation timestamp of the fixture tariffs
    pub fn tariff_created_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    /// Clock frozen at [`TemporalFixtures::today`]
    pub fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::at_date(Self::today()))
    }
}

/// Fixture for identifiers used by the standard catalog
pub struct IdFixtures;

impl IdFixtures {
    pub const FULLY_INSURED_PATIENT: PatientId = PatientId::new(1);
    pub const PRIMARY_ONLY_PATIENT: PatientId = PatientId::new(2);
    pub const UNINSURED_PATIENT: PatientId = PatientId::new(3);
    pub const FULL_COVERAGE_PATIENT: PatientId = PatientId::new(4);

    pub const PRIMARY_PLAN: PlanId = PlanId::new(1);
    pub const SUPPLEMENTARY_PLAN: PlanId = PlanId::new(2);
    pub const FULL_COVERAGE_PLAN: PlanId = PlanId::new(3);

    pub const CONSULTATION: ServiceId = ServiceId::new(10);
    pub const MRI_SCAN: ServiceId = ServiceId::new(11);
    pub const CT_SCAN: ServiceId = ServiceId::new(12);

    pub const GENERAL_CATEGORY: ServiceCategoryId = ServiceCategoryId::new(1);
    pub const IMAGING_CATEGORY: ServiceCategoryId = ServiceCategoryId::new(2);
}

/// Fixture for plans
pub struct PlanFixtures;

impl PlanFixtures {
    /// Creates a plan with an unbounded validity window
    pub fn plan(
        id: PlanId,
        insurance_type: InsuranceType,
        coverage_percent: Decimal,
        deductible: Decimal,
    ) -> InsurancePlan {
        InsurancePlan {
            id,
            name: format!("Plan {}", id.value()),
            insurance_type,
            coverage_percent: Percentage::clamped(coverage_percent),
            deductible: Money::new(deductible),
            validity: ValidityWindow::unbounded(),
            is_active: true,
        }
    }

    /// 70% primary plan without deductible
    pub fn primary() -> InsurancePlan {
        Self::plan(IdFixtures::PRIMARY_PLAN, InsuranceType::Primary, dec!(70), dec!(0))
    }

    /// Supplementary plan (its percentages live on the tariffs)
    pub fn supplementary() -> InsurancePlan {
        Self::plan(IdFixtures::SUPPLEMENTARY_PLAN, InsuranceType::Supplementary, dec!(90), dec!(0))
    }

    /// 100% primary plan
    pub fn full_coverage() -> InsurancePlan {
        Self::plan(IdFixtures::FULL_COVERAGE_PLAN, InsuranceType::Primary, dec!(100), dec!(0))
    }
}

/// Fixture for services and tariffs
pub struct TariffFixtures;

impl TariffFixtures {
    pub fn service(id: ServiceId, category: ServiceCategoryId, base_price: Decimal) -> MedicalService {
        MedicalService {
            id,
            name: format!("Service {}", id.value()),
            category_id: category,
            base_price: Money::new(base_price),
        }
    }

    /// Primary tariff priced at 1,000,000 splitting shares at 70%
    pub fn primary(id: i64, plan_id: PlanId, service_id: ServiceId) -> InsuranceTariff {
        InsuranceTariff::primary(
            TariffId::new(id),
            plan_id,
            service_id,
            Money::new(dec!(1000000)),
            Percentage::new(dec!(70)).unwrap(),
            TemporalFixtures::tariff_created_at(),
        )
        .unwrap()
    }

    /// Supplementary tariff priced at 1,000,000
    pub fn supplementary(
        id: i64,
        plan_id: PlanId,
        service_id: ServiceId,
        percent: Decimal,
        max_payment: Option<Decimal>,
    ) -> InsuranceTariff {
        InsuranceTariff::supplementary(
            TariffId::new(id),
            plan_id,
            service_id,
            Money::new(dec!(1000000)),
            Percentage::new(percent).unwrap(),
            max_payment.map(Money::new),
            TemporalFixtures::tariff_created_at(),
        )
        .unwrap()
    }
}

/// Fixture for patients and policies
pub struct PatientFixtures;

impl PatientFixtures {
    /// Patient born March 15, 1980
    pub fn profile(id: PatientId) -> PatientProfile {
        PatientProfile {
            id,
            birth_date: NaiveDate::from_ymd_opt(1980, 3, 15),
            gender: Some(Gender::Female),
        }
    }

    /// Open-ended active policy starting [`TemporalFixtures::policy_start`]
    pub fn policy(id: i64, patient_id: PatientId, plan_id: PlanId, is_primary: bool) -> PatientInsurance {
        PatientInsurance {
            id: PatientInsuranceId::new(id),
            patient_id,
            plan_id,
            policy_number: format!("POL-{:05}", id),
            is_primary,
            start_date: TemporalFixtures::policy_start(),
            end_date: None,
            is_active: true,
        }
    }
}

/// Fixture for seeded stores
pub struct StoreFixtures;

impl StoreFixtures {
    /// Builds the standard catalog described in the module docs
    pub async fn standard() -> Arc<InMemoryCoverageStore> {
        let store = InMemoryCoverageStore::new();

        store.add_plan(PlanFixtures::primary()).await;
        store.add_plan(PlanFixtures::supplementary()).await;
        store.add_plan(PlanFixtures::full_coverage()).await;

        store
            .add_service(TariffFixtures::service(IdFixtures::CONSULTATION, IdFixtures::GENERAL_CATEGORY, dec!(1000000)))
            .await;
        store
            .add_service(TariffFixtures::service(IdFixtures::MRI_SCAN, IdFixtures::IMAGING_CATEGORY, dec!(1000000)))
            .await;
        store
            .add_service(TariffFixtures::service(IdFixtures::CT_SCAN, IdFixtures::IMAGING_CATEGORY, dec!(800000)))
            .await;

        store
            .add_tariff(TariffFixtures::primary(1, IdFixtures::PRIMARY_PLAN, IdFixtures::CONSULTATION))
            .await;
        store
            .add_tariff(TariffFixtures::primary(2, IdFixtures::PRIMARY_PLAN, IdFixtures::MRI_SCAN))
            .await;
        store
            .add_tariff(TariffFixtures::primary(3, IdFixtures::FULL_COVERAGE_PLAN, ServiceId::WILDCARD))
            .await;
        store
            .add_tariff(TariffFixtures::supplementary(
                4,
                IdFixtures::SUPPLEMENTARY_PLAN,
                IdFixtures::CONSULTATION,
                dec!(90),
                None,
            ))
            .await;
        store
            .add_tariff(TariffFixtures::supplementary(
                5,
                IdFixtures::SUPPLEMENTARY_PLAN,
                IdFixtures::MRI_SCAN,
                dec!(90),
                Some(dec!(100000)),
            ))
            .await;

        for patient in [
            IdFixtures::FULLY_INSURED_PATIENT,
            IdFixtures::PRIMARY_ONLY_PATIENT,
            IdFixtures::UNINSURED_PATIENT,
            IdFixtures::FULL_COVERAGE_PATIENT,
        ] {
            store.add_patient(PatientFixtures::profile(patient)).await;
        }

        store
            .enroll(PatientFixtures::policy(1, IdFixtures::FULLY_INSURED_PATIENT, IdFixtures::PRIMARY_PLAN, true))
            .await;
        store
            .enroll(PatientFixtures::policy(2, IdFixtures::FULLY_INSURED_PATIENT, IdFixtures::SUPPLEMENTARY_PLAN, false))
            .await;
        store
            .enroll(PatientFixtures::policy(3, IdFixtures::PRIMARY_ONLY_PATIENT, IdFixtures::PRIMARY_PLAN, true))
            .await;
        store
            .enroll(PatientFixtures::policy(4, IdFixtures::FULL_COVERAGE_PATIENT, IdFixtures::FULL_COVERAGE_PLAN, true))
            .await;
        store
            .enroll(PatientFixtures::policy(5, IdFixtures::FULL_COVERAGE_PATIENT, IdFixtures::SUPPLEMENTARY_PLAN, false))
            .await;

        Arc::new(store)
    }
}
