//! Coverage Domain Ports
//!
//! Data the engine reads but does not own: plan catalog, patient registry and
//! rule repository. Each is an async port trait so the orchestrator can be
//! wired to a database, a remote catalog or the in-memory store.
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_coverage::ports::{PlanCatalogPort, PatientInsurancePort, RuleRepositoryPort};
//! use domain_coverage::adapters::InMemoryCoverageStore;
//! use std::sync::Arc;
//!
//! let store = Arc::new(InMemoryCoverageStore::new());
//! let catalog: Arc<dyn PlanCatalogPort> = store.clone();
//! let patients: Arc<dyn PatientInsurancePort> = store.clone();
//! let rules: Arc<dyn RuleRepositoryPort> = store;
//! ```
//!
//! Lookups return `Ok(None)` when a record does not exist; `PortError` is
//! reserved for failures of the data source itself.

use async_trait::async_trait;
use chrono::NaiveDate;

use core_kernel::{DomainPort, PatientId, PlanId, PortError, ServiceCategoryId, ServiceId};

use crate::model::{
    InsurancePlan, InsuranceTariff, InsuranceType, MedicalService, PatientInsurance,
    PatientProfile, PlanService,
};
use crate::rules::{BusinessRule, RuleType};

/// Read access to plans, services and tariffs
#[async_trait]
pub trait PlanCatalogPort: DomainPort {
    /// Retrieves a plan by ID
    async fn get_plan(&self, plan_id: PlanId) -> Result<Option<InsurancePlan>, PortError>;

    /// Retrieves the plan-level configuration of a service
    async fn get_plan_service(
        &self,
        plan_id: PlanId,
        service_id: ServiceId,
    ) -> Result<Option<PlanService>, PortError>;

    /// Retrieves a medical service by ID
    async fn get_service(&self, service_id: ServiceId) -> Result<Option<MedicalService>, PortError>;

    /// Finds the usable tariff for a (plan, service) pair
    ///
    /// # Arguments
    ///
    /// * `plan_id` - The plan the tariff belongs to
    /// * `service_id` - The priced service
    /// * `insurance_type` - Primary or supplementary tariff
    ///
    /// # Returns
    ///
    /// An active, non-deleted tariff keyed by the exact service, otherwise the
    /// plan's wildcard tariff, otherwise `None`.
    async fn find_tariff(
        &self,
        plan_id: PlanId,
        service_id: ServiceId,
        insurance_type: InsuranceType,
    ) -> Result<Option<InsuranceTariff>, PortError>;

    /// Lists the non-deleted tariffs of a plan
    async fn tariffs_for_plan(&self, plan_id: PlanId) -> Result<Vec<InsuranceTariff>, PortError>;
}

/// Read access to patients and their policies
#[async_trait]
pub trait PatientInsurancePort: DomainPort {
    /// Retrieves the attributes rules may condition on
    async fn get_patient(&self, patient_id: PatientId) -> Result<Option<PatientProfile>, PortError>;

    /// Finds the primary policy active on `date`
    async fn active_primary(
        &self,
        patient_id: PatientId,
        date: NaiveDate,
    ) -> Result<Option<PatientInsurance>, PortError>;

    /// Finds the supplementary policy active on `date`
    async fn active_supplementary(
        &self,
        patient_id: PatientId,
        date: NaiveDate,
    ) -> Result<Option<PatientInsurance>, PortError>;
}

/// Read access to compiled business rules
#[async_trait]
pub trait RuleRepositoryPort: DomainPort {
    /// Finds the rules of a type that may apply to a plan and service category
    ///
    /// Returns rules scoped to the plan (or to no plan) and to the category
    /// (or to no category), in any order and regardless of their active flag
    /// or validity window; the engine filters and orders them.
    async fn find_rules(
        &self,
        rule_type: RuleType,
        plan_id: PlanId,
        service_category_id: Option<ServiceCategoryId>,
    ) -> Result<Vec<BusinessRule>, PortError>;
}
