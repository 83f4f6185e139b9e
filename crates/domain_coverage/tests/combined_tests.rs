//! Combined Coverage Tests
//!
//! End-to-end tests of `CombinedCoverageService` over the standard
//! in-memory catalog from `test_utils`.
//!
//! # Test Organization
//!
//! - `scenarios` - Reference calculations (primary only, supplementary,
//!   ceilings, full coverage, missing insurance, batches)
//! - `request_validation` - Rejected inputs
//! - `rule_overrides` - Business rules changing the calculation
//! - `supplementary_entry_point` - Supplementary-only calculation and caching
//! - `failures` - Data source failures and configuration choices
//! - `extreme_amounts` - Amounts at the edge of the decimal range
//! - `monitoring` - Events emitted per calculation

use std::sync::Arc;
use std::time::Duration;

use core_kernel::{Money, PatientId, ServiceId};
use domain_coverage::{
    CalculationKind, CalculationOutcome, CoverageError, EngineConfig, ErrorCategory,
    InMemoryCoverageStore, MissingSupplementaryTariff, RuleType, TtlCache,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use test_utils::{
    assert_combined, assert_money_eq, assert_money_zero, IdFixtures, StoreFixtures,
    TariffFixtures, TemporalFixtures, TestEngineBuilder, TestRuleBuilder,
};

// ============================================================================
// TEST FIXTURES
// ============================================================================

fn million() -> Money {
    Money::new(dec!(1000000))
}

async fn standard_store() -> Arc<InMemoryCoverageStore> {
    StoreFixtures::standard().await
}

// ============================================================================
// Reference scenarios
// ============================================================================

mod scenarios {
    use super::*;

    #[tokio::test]
    async fn test_primary_only() {
        let (service, _) = TestEngineBuilder::new(standard_store().await).build();

        let result = service
            .calculate(IdFixtures::PRIMARY_ONLY_PATIENT, IdFixtures::CONSULTATION, million(), TemporalFixtures::today())
            .await
            .unwrap();

        assert_money_eq(&result.primary.insurance_coverage, dec!(700000));
        assert_money_eq(&result.primary.patient_payment, dec!(300000));
        assert_combined(&result, dec!(700000), dec!(300000));
        assert!(result.supplementary_plan_id.is_none());
        assert_eq!(result.breakdown, "Primary: 70.0%");
    }

    #[tokio::test]
    async fn test_supplementary_on_remaining_liability() {
        let (service, _) = TestEngineBuilder::new(standard_store().await).build();

        let result = service
            .calculate(IdFixtures::FULLY_INSURED_PATIENT, IdFixtures::CONSULTATION, million(), TemporalFixtures::today())
            .await
            .unwrap();

        assert_money_eq(&result.primary.insurance_coverage, dec!(700000));
        assert_money_eq(&result.supplementary_coverage, dec!(270000));
        assert_combined(&result, dec!(970000), dec!(30000));
        assert_eq!(result.supplementary_plan_id, Some(IdFixtures::SUPPLEMENTARY_PLAN));
        assert_eq!(result.breakdown, "Primary: 70.0%, Supplementary: 90.0%");
        assert!(!result.is_fully_covered);
    }

    #[tokio::test]
    async fn test_supplementary_ceiling() {
        let (service, _) = TestEngineBuilder::new(standard_store().await).build();

        let result = service
            .calculate(IdFixtures::FULLY_INSURED_PATIENT, IdFixtures::MRI_SCAN, million(), TemporalFixtures::today())
            .await
            .unwrap();

        assert_money_eq(&result.supplementary_coverage, dec!(100000));
        assert_combined(&result, dec!(800000), dec!(200000));
    }

    #[tokio::test]
    async fn test_full_primary_coverage() {
        let (service, _) = TestEngineBuilder::new(standard_store().await).build();

        let result = service
            .calculate(IdFixtures::FULL_COVERAGE_PATIENT, IdFixtures::CT_SCAN, million(), TemporalFixtures::today())
            .await
            .unwrap();

        assert_money_zero(&result.supplementary_coverage);
        assert_money_zero(&result.final_patient_share);
        assert!(result.is_fully_covered);
        assert_combined(&result, dec!(1000000), dec!(0));
    }

    #[tokio::test]
    async fn test_no_primary_insurance() {
        let (service, _) = TestEngineBuilder::new(standard_store().await).build();

        let err = service
            .calculate(IdFixtures::UNINSURED_PATIENT, IdFixtures::CONSULTATION, million(), TemporalFixtures::today())
            .await
            .unwrap_err();

        assert_eq!(err.category(), ErrorCategory::NotFound);
        assert_eq!(err.message(), "active primary insurance not found");

        let outcome = CalculationOutcome::<()>::from(err);
        assert!(!outcome.success);
        assert_eq!(outcome.error_category, Some(ErrorCategory::NotFound));
    }

    #[tokio::test]
    async fn test_batch_skips_failed_lines() {
        let (service, _) = TestEngineBuilder::new(standard_store().await).build();
        let services = [IdFixtures::CONSULTATION, IdFixtures::CT_SCAN, IdFixtures::MRI_SCAN];
        let amounts = [million(), million(), million()];

        let results = service
            .calculate_for_services(IdFixtures::FULLY_INSURED_PATIENT, &services, &amounts, None)
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].service_id, IdFixtures::CONSULTATION);
        assert_eq!(results[1].service_id, IdFixtures::MRI_SCAN);
        assert_eq!(results[0].calculation_date, TemporalFixtures::today());
    }

    #[tokio::test]
    async fn test_batch_shape_errors() {
        let (service, _) = TestEngineBuilder::new(standard_store().await).build();

        let empty = service
            .calculate_for_services(IdFixtures::FULLY_INSURED_PATIENT, &[], &[], None)
            .await
            .unwrap_err();
        assert_eq!(empty.category(), ErrorCategory::Validation);

        let mismatch = service
            .calculate_for_services(
                IdFixtures::FULLY_INSURED_PATIENT,
                &[IdFixtures::CONSULTATION, IdFixtures::MRI_SCAN],
                &[million()],
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(mismatch.category(), ErrorCategory::Validation);
    }
}

// ============================================================================
// Request validation
// ============================================================================

mod request_validation {
    use super::*;

    #[tokio::test]
    async fn test_invalid_ids() {
        let (service, _) = TestEngineBuilder::new(standard_store().await).build();

        let err = service
            .calculate(PatientId::new(0), IdFixtures::CONSULTATION, million(), TemporalFixtures::today())
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);

        let err = service
            .calculate(IdFixtures::FULLY_INSURED_PATIENT, ServiceId::new(-4), million(), TemporalFixtures::today())
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[tokio::test]
    async fn test_non_positive_amount() {
        let (service, _) = TestEngineBuilder::new(standard_store().await).build();

        for amount in [Money::zero(), Money::new(dec!(-10))] {
            let err = service
                .calculate(IdFixtures::FULLY_INSURED_PATIENT, IdFixtures::CONSULTATION, amount, TemporalFixtures::today())
                .await
                .unwrap_err();
            assert_eq!(err.category(), ErrorCategory::Validation);
        }
    }

    #[tokio::test]
    async fn test_future_date_tolerance() {
        let (service, _) = TestEngineBuilder::new(standard_store().await).build();
        let tomorrow = TemporalFixtures::today().succ_opt().unwrap();
        let day_after = tomorrow.succ_opt().unwrap();

        assert!(service
            .calculate(IdFixtures::FULLY_INSURED_PATIENT, IdFixtures::CONSULTATION, million(), tomorrow)
            .await
            .is_ok());

        let err = service
            .calculate(IdFixtures::FULLY_INSURED_PATIENT, IdFixtures::CONSULTATION, million(), day_after)
            .await
            .unwrap_err();
        assert!(matches!(err, CoverageError::Validation(_)));
    }

    #[tokio::test]
    async fn test_missing_tariff() {
        let (service, _) = TestEngineBuilder::new(standard_store().await).build();

        let err = service
            .calculate(IdFixtures::FULLY_INSURED_PATIENT, IdFixtures::CT_SCAN, million(), TemporalFixtures::today())
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }

    #[tokio::test]
    async fn test_unknown_service() {
        let (service, _) = TestEngineBuilder::new(standard_store().await).build();

        let err = service
            .calculate(IdFixtures::FULLY_INSURED_PATIENT, ServiceId::new(999), million(), TemporalFixtures::today())
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }
}

// ============================================================================
// Rule overrides
// ============================================================================

mod rule_overrides {
    use super::*;

    #[tokio::test]
    async fn test_coverage_percent_rule_for_category() {
        let store = standard_store().await;
        store
            .add_rule_definition(
                TestRuleBuilder::new(1, RuleType::CoveragePercent)
                    .priority(10)
                    .for_category(IdFixtures::IMAGING_CATEGORY)
                    .action("set_coverage_percent", json!(80))
                    .build(),
            )
            .await
            .unwrap();
        let (service, _) = TestEngineBuilder::new(store).build();

        let imaging = service
            .calculate_primary(IdFixtures::PRIMARY_ONLY_PATIENT, IdFixtures::MRI_SCAN, million(), TemporalFixtures::today())
            .await
            .unwrap();
        assert_money_eq(&imaging.insurance_coverage, dec!(800000));
        assert_eq!(imaging.applied_rule.map(|r| r.value()), Some(1));

        let consultation = service
            .calculate_primary(IdFixtures::PRIMARY_ONLY_PATIENT, IdFixtures::CONSULTATION, million(), TemporalFixtures::today())
            .await
            .unwrap();
        assert_money_eq(&consultation.insurance_coverage, dec!(700000));
        assert!(consultation.applied_rule.is_none());
    }

    #[tokio::test]
    async fn test_deductible_rule() {
        let store = standard_store().await;
        store
            .add_rule_definition(
                TestRuleBuilder::new(2, RuleType::Deductible)
                    .action("set_deductible", json!(100000))
                    .build(),
            )
            .await
            .unwrap();
        let (service, _) = TestEngineBuilder::new(store).build();

        let result = service
            .calculate_primary(IdFixtures::PRIMARY_ONLY_PATIENT, IdFixtures::CONSULTATION, million(), TemporalFixtures::today())
            .await
            .unwrap();
        assert_money_eq(&result.deductible_amount, dec!(100000));
        assert_money_eq(&result.insurance_coverage, dec!(630000));
        assert_money_eq(&result.patient_payment, dec!(370000));
    }

    #[tokio::test]
    async fn test_payment_limit_rule_rejects() {
        let store = standard_store().await;
        store
            .add_rule_definition(
                TestRuleBuilder::new(3, RuleType::PaymentLimit)
                    .action("validate_payment_limit", json!(500000))
                    .build(),
            )
            .await
            .unwrap();
        let (service, _) = TestEngineBuilder::new(store).build();

        let err = service
            .calculate(IdFixtures::FULLY_INSURED_PATIENT, IdFixtures::CONSULTATION, million(), TemporalFixtures::today())
            .await
            .unwrap_err();
        assert!(matches!(err, CoverageError::PaymentLimitExceeded { .. }));
        assert_eq!(err.category(), ErrorCategory::Validation);

        assert!(service
            .calculate(IdFixtures::FULLY_INSURED_PATIENT, IdFixtures::CONSULTATION, Money::new(dec!(400000)), TemporalFixtures::today())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_max_payment_rule_caps_primary() {
        let store = standard_store().await;
        store
            .add_rule_definition(
                TestRuleBuilder::new(4, RuleType::PaymentLimit)
                    .action("set_max_payment", json!(250000))
                    .build(),
            )
            .await
            .unwrap();
        let (service, _) = TestEngineBuilder::new(store).build();

        let result = service
            .calculate(IdFixtures::PRIMARY_ONLY_PATIENT, IdFixtures::CONSULTATION, million(), TemporalFixtures::today())
            .await
            .unwrap();
        assert_money_eq(&result.primary.insurance_coverage, dec!(250000));
        assert_combined(&result, dec!(250000), dec!(750000));
    }

    #[tokio::test]
    async fn test_supplementary_disabled_by_rule() {
        let store = standard_store().await;
        store
            .add_rule_definition(
                TestRuleBuilder::new(5, RuleType::SupplementaryInsurance)
                    .for_category(IdFixtures::GENERAL_CATEGORY)
                    .action("set_supplementary_applicable", json!(false))
                    .build(),
            )
            .await
            .unwrap();
        let (service, _) = TestEngineBuilder::new(store).build();

        let result = service
            .calculate(IdFixtures::FULLY_INSURED_PATIENT, IdFixtures::CONSULTATION, million(), TemporalFixtures::today())
            .await
            .unwrap();
        assert!(result.supplementary_plan_id.is_none());
        assert_combined(&result, dec!(700000), dec!(300000));
    }

    #[tokio::test]
    async fn test_age_rule_uses_patient_profile() {
        let store = standard_store().await;
        // Fixture patients are born in 1980: 44 on the fixture date
        store
            .add_rule_definition(
                TestRuleBuilder::new(6, RuleType::CoveragePercent)
                    .priority(5)
                    .condition("patient_age", json!({ "min": 40, "max": 50 }))
                    .action("set_coverage_percent", json!(75))
                    .build(),
            )
            .await
            .unwrap();
        let (service, _) = TestEngineBuilder::new(store).build();

        let evaluation = service
            .evaluate_rules(
                IdFixtures::PRIMARY_ONLY_PATIENT,
                IdFixtures::CONSULTATION,
                million(),
                TemporalFixtures::today(),
                RuleType::CoveragePercent,
            )
            .await
            .unwrap();
        assert_eq!(evaluation.matched_rule.map(|r| r.value()), Some(6));
        assert_eq!(evaluation.effect.coverage_percent.map(|p| p.value()), Some(dec!(75)));
    }
}

// ============================================================================
// Supplementary-only entry point
// ============================================================================

mod supplementary_entry_point {
    use super::*;

    #[tokio::test]
    async fn test_supplementary_only() {
        let (service, _) = TestEngineBuilder::new(standard_store().await).build();

        let result = service
            .calculate_supplementary(
                IdFixtures::FULLY_INSURED_PATIENT,
                IdFixtures::CONSULTATION,
                million(),
                Money::new(dec!(700000)),
                TemporalFixtures::today(),
            )
            .await
            .unwrap();
        assert_money_eq(&result.supplementary_coverage, dec!(270000));
        assert_money_eq(&result.final_patient_share, dec!(30000));
    }

    #[tokio::test]
    async fn test_requires_supplementary_policy() {
        let (service, _) = TestEngineBuilder::new(standard_store().await).build();

        let err = service
            .calculate_supplementary(
                IdFixtures::PRIMARY_ONLY_PATIENT,
                IdFixtures::CONSULTATION,
                million(),
                Money::new(dec!(700000)),
                TemporalFixtures::today(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.message(), "active supplementary insurance not found");
    }

    #[tokio::test]
    async fn test_results_are_cached() {
        let store = standard_store().await;
        let cache = Arc::new(TtlCache::new(Duration::from_secs(60), 10));
        let (service, _) = TestEngineBuilder::new(store.clone()).with_cache(cache.clone()).build();

        let first = service
            .calculate_supplementary(
                IdFixtures::FULLY_INSURED_PATIENT,
                IdFixtures::CONSULTATION,
                million(),
                Money::new(dec!(700000)),
                TemporalFixtures::today(),
            )
            .await
            .unwrap();
        assert_eq!(cache.len(), 1);

        // A store outage no longer matters for the cached key
        store.set_unavailable(true);
        let second = service
            .calculate_supplementary(
                IdFixtures::FULLY_INSURED_PATIENT,
                IdFixtures::CONSULTATION,
                million(),
                Money::new(dec!(700000)),
                TemporalFixtures::today(),
            )
            .await
            .unwrap();
        assert_eq!(first, second);
    }
}

// ============================================================================
// Failures and configuration
// ============================================================================

mod failures {
    use super::*;

    #[tokio::test]
    async fn test_store_outage_is_system_error() {
        let store = standard_store().await;
        store.set_unavailable(true);
        let (service, _) = TestEngineBuilder::new(store).build();

        let err = service
            .calculate(IdFixtures::FULLY_INSURED_PATIENT, IdFixtures::CONSULTATION, million(), TemporalFixtures::today())
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::System);
        assert_eq!(err.message(), "error calculating combined insurance");
    }

    #[tokio::test]
    async fn test_missing_supplementary_tariff_patient_liable() {
        let store = standard_store().await;
        // Primary plan covers the CT scan, supplementary plan does not
        store
            .add_tariff(TariffFixtures::primary(20, IdFixtures::PRIMARY_PLAN, IdFixtures::CT_SCAN))
            .await;
        let (service, _) = TestEngineBuilder::new(store).build();

        let result = service
            .calculate(IdFixtures::FULLY_INSURED_PATIENT, IdFixtures::CT_SCAN, million(), TemporalFixtures::today())
            .await
            .unwrap();
        assert_combined(&result, dec!(700000), dec!(300000));
        assert!(result.supplementary_coverage_percent.is_none());
        assert_eq!(result.breakdown, "Primary: 70.0%, Supplementary: no tariff for this service");
    }

    #[tokio::test]
    async fn test_missing_supplementary_tariff_abort() {
        let store = standard_store().await;
        store
            .add_tariff(TariffFixtures::primary(20, IdFixtures::PRIMARY_PLAN, IdFixtures::CT_SCAN))
            .await;
        let config = EngineConfig {
            missing_supplementary_tariff: MissingSupplementaryTariff::Abort,
            ..Default::default()
        };
        let (service, _) = TestEngineBuilder::new(store).with_config(config).build();

        let err = service
            .calculate(IdFixtures::FULLY_INSURED_PATIENT, IdFixtures::CT_SCAN, million(), TemporalFixtures::today())
            .await
            .unwrap_err();
        assert_eq!(err.message(), "supplementary tariff not defined for this service");
    }
}

// ============================================================================
// Extreme amounts
// ============================================================================

mod extreme_amounts {
    use super::*;
    use test_utils::TestTariffBuilder;

    #[tokio::test]
    async fn test_max_decimal_amount_is_system_error() {
        let (service, monitor) = TestEngineBuilder::new(standard_store().await).build();

        for patient in [IdFixtures::PRIMARY_ONLY_PATIENT, IdFixtures::FULLY_INSURED_PATIENT] {
            let err = service
                .calculate(patient, IdFixtures::CONSULTATION, Money::new(Decimal::MAX), TemporalFixtures::today())
                .await
                .unwrap_err();
            assert_eq!(err.category(), ErrorCategory::System);
            assert_eq!(err.message(), "error calculating combined insurance");
        }

        let err = service
            .calculate_primary(
                IdFixtures::PRIMARY_ONLY_PATIENT,
                IdFixtures::CONSULTATION,
                Money::new(Decimal::MAX),
                TemporalFixtures::today(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::System);
        assert_eq!(monitor.summary().failed_calculations, 3);
    }

    #[tokio::test]
    async fn test_supplementary_entry_point_with_max_decimal() {
        let (service, _) = TestEngineBuilder::new(standard_store().await).build();

        let err = service
            .calculate_supplementary(
                IdFixtures::FULLY_INSURED_PATIENT,
                IdFixtures::CONSULTATION,
                Money::new(Decimal::MAX),
                Money::zero(),
                TemporalFixtures::today(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::System);
    }

    #[tokio::test]
    async fn test_large_amount_within_range_is_calculated() {
        let (service, _) = TestEngineBuilder::new(standard_store().await).build();
        let amount = Money::new(dec!(1000000000000000000000));

        let result = service
            .calculate(IdFixtures::FULLY_INSURED_PATIENT, IdFixtures::CONSULTATION, amount, TemporalFixtures::today())
            .await
            .unwrap();

        assert_money_eq(&result.primary.insurance_coverage, dec!(700000000000000000000));
        assert_combined(&result, dec!(970000000000000000000), dec!(30000000000000000000));
    }

    #[tokio::test]
    async fn test_batch_total_past_decimal_range_is_system_error() {
        let (service, monitor) = TestEngineBuilder::new(standard_store().await).build();
        let services = [IdFixtures::CONSULTATION, IdFixtures::CONSULTATION];
        let amounts = [Money::new(Decimal::MAX), Money::new(dec!(1))];

        let err = service
            .calculate_for_services(IdFixtures::FULLY_INSURED_PATIENT, &services, &amounts, None)
            .await
            .unwrap_err();

        assert_eq!(err.category(), ErrorCategory::System);
        let summary = monitor.summary();
        assert_eq!(summary.failed_calculations, 1);
        assert_eq!(summary.errors_by_category.get("system"), Some(&1));
    }

    #[tokio::test]
    async fn test_batch_skips_line_too_large_to_price() {
        let (service, _) = TestEngineBuilder::new(standard_store().await).build();
        let services = [IdFixtures::CONSULTATION, IdFixtures::CONSULTATION];
        let amounts = [Money::new(dec!(50000000000000000000000000000)), million()];

        let results = service
            .calculate_for_services(IdFixtures::FULLY_INSURED_PATIENT, &services, &amounts, None)
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_combined(&results[0], dec!(970000), dec!(30000));
    }

    #[tokio::test]
    async fn test_tariff_with_extreme_shares_is_reported() {
        let (service, _) = TestEngineBuilder::new(standard_store().await).build();
        let tariff = TestTariffBuilder::new()
            .with_id(500)
            .with_service(IdFixtures::CT_SCAN)
            .with_shares(Decimal::MAX, Decimal::MAX)
            .build();

        let report = service.validate_tariff(&tariff).await.unwrap();

        assert!(!report.is_valid);
        assert!(report.joined_errors().contains("overflows"), "{}", report.joined_errors());
    }
}

// ============================================================================
// Monitoring
// ============================================================================

mod monitoring {
    use super::*;

    #[tokio::test]
    async fn test_events_recorded() {
        let (service, monitor) = TestEngineBuilder::new(standard_store().await).build();

        service
            .calculate(IdFixtures::FULLY_INSURED_PATIENT, IdFixtures::CONSULTATION, million(), TemporalFixtures::today())
            .await
            .unwrap();
        service
            .calculate(IdFixtures::UNINSURED_PATIENT, IdFixtures::CONSULTATION, million(), TemporalFixtures::today())
            .await
            .unwrap_err();

        let calculations = monitor.calculations();
        assert_eq!(calculations.len(), 2);
        assert!(calculations[0].success);
        assert_eq!(calculations[0].kind, CalculationKind::Combined);
        assert_eq!(calculations[0].final_patient_share, Some(Money::new(dec!(30000))));
        assert!(!calculations[1].success);

        let summary = monitor.summary();
        assert_eq!(summary.failed_calculations, 1);
        assert_eq!(summary.errors_by_category.get("not_found"), Some(&1));
    }

    #[tokio::test]
    async fn test_batch_records_each_line() {
        let (service, monitor) = TestEngineBuilder::new(standard_store().await).build();
        let services = [IdFixtures::CONSULTATION, IdFixtures::CT_SCAN];

        service
            .calculate_for_services(IdFixtures::FULLY_INSURED_PATIENT, &services, &[million(), million()], None)
            .await
            .unwrap();

        let kinds: Vec<_> = monitor.calculations().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![CalculationKind::Combined, CalculationKind::Combined, CalculationKind::Batch]
        );
        assert_eq!(monitor.errors().len(), 1);
    }
}
