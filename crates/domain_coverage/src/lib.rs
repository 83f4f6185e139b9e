//! Coverage Calculation Domain
//!
//! Computes, for one medical-service invoice line, how much the patient's
//! primary insurance pays, how much an optional supplementary insurance
//! pays on top, and what the patient owes.
//!
//! # Architecture
//!
//! - **Model**: plans, plan-service overrides, services, policies, tariffs
//! - **Rules**: prioritised business rules overriding coverage parameters
//! - **Calculators**: pure primary and supplementary coverage functions
//! - **Orchestrator**: `CombinedCoverageService` wiring ports, rules and
//!   calculators together
//! - **Ports**: plan catalog, patient registry, rule repository
//!
//! # Calculation Pipeline
//!
//! ```text
//! request -> primary policy -> plan / service / tariff -> rules
//!         -> primary coverage -> supplementary policy? -> supplementary coverage
//!         -> combined result
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_coverage::{CombinedCoverageService, EngineConfig, InMemoryCoverageStore};
//!
//! let store = Arc::new(InMemoryCoverageStore::load("catalog.json").await?);
//! let service = CombinedCoverageService::new(store.clone(), store.clone(), store, EngineConfig::default());
//!
//! let result = service
//!     .calculate(patient_id, service_id, Money::new(dec!(1000000)), date)
//!     .await?;
//! assert_eq!(result.breakdown, "Primary: 70.0%, Supplementary: 90.0%");
//! ```

pub mod adapters;
pub mod cache;
pub mod combined;
pub mod config;
pub mod context;
pub mod error;
pub mod model;
pub mod monitoring;
pub mod outcome;
pub mod ports;
pub mod primary;
pub mod results;
pub mod rules;
pub mod rules_engine;
pub mod supplementary;
pub mod validation;

pub use adapters::{CatalogSnapshot, InMemoryCoverageStore};
pub use cache::{CoverageCache, SupplementaryCacheKey, TtlCache};
pub use combined::CombinedCoverageService;
pub use config::{EngineConfig, MissingSupplementaryTariff, UnknownConditionPolicy};
pub use context::InsuranceCalculationContext;
pub use error::{CoverageError, ErrorCategory};
pub use model::{
    derive_tariff_price, split_shares, Gender, InsurancePlan, InsuranceTariff, InsuranceType,
    MedicalService, PatientInsurance, PatientProfile, PlanService,
};
pub use monitoring::{
    CalculationEvent, CalculationKind, ErrorEvent, InMemoryMonitor, MonitoringSink,
    MonitoringSummary, NoopMonitor, TracingMonitor,
};
pub use outcome::CalculationOutcome;
pub use ports::{PatientInsurancePort, PlanCatalogPort, RuleRepositoryPort};
pub use primary::{calculate_coverage, calculate_with_parameters, CoverageParameters};
pub use results::{CalculationResult, CombinedCalculationResult, SupplementaryCalculationResult};
pub use rules::{BusinessRule, NumericRange, RuleAction, RuleCondition, RuleDefinition, RuleType, RulesError};
pub use rules_engine::{
    evaluate_rules, BusinessRuleEngine, PaymentLimitCheck, RuleEffect, RuleEvaluation, SkippedRule,
};
pub use supplementary::{calculate_supplementary, patient_liable};
pub use validation::{check_primary, check_supplementary, TariffValidator, ValidationReport};
