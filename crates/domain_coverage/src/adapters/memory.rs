//! In-memory coverage store
//!
//! Implements all three coverage ports over `tokio::sync::RwLock`-guarded
//! collections. Used by the API server (seeded from a JSON catalog
//! snapshot) and by tests.
//!
//! ```rust,ignore
//! let store = InMemoryCoverageStore::load("catalog.json").await?;
//! let store = Arc::new(store);
//! let service = CombinedCoverageService::new(store.clone(), store.clone(), store, config);
//! ```

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info};

use core_kernel::{
    AdapterHealth, DomainPort, HealthCheckResult, HealthCheckable, PatientId, PlanId, PortError,
    ServiceCategoryId, ServiceId,
};

use crate::model::{
    InsurancePlan, InsuranceTariff, InsuranceType, MedicalService, PatientInsurance,
    PatientProfile, PlanService,
};
use crate::ports::{PatientInsurancePort, PlanCatalogPort, RuleRepositoryPort};
use crate::rules::{BusinessRule, RuleDefinition, RuleType, RulesError};

/// Serialised catalog used to seed the store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSnapshot {
    pub plans: Vec<InsurancePlan>,
    pub services: Vec<MedicalService>,
    pub plan_services: Vec<PlanService>,
    pub tariffs: Vec<InsuranceTariff>,
    pub patients: Vec<PatientProfile>,
    pub policies: Vec<PatientInsurance>,
    pub rules: Vec<RuleDefinition>,
}

/// Coverage data held in memory
#[derive(Debug, Default)]
pub struct InMemoryCoverageStore {
    plans: RwLock<HashMap<PlanId, InsurancePlan>>,
    services: RwLock<HashMap<ServiceId, MedicalService>>,
    plan_services: RwLock<HashMap<(PlanId, ServiceId), PlanService>>,
    tariffs: RwLock<Vec<InsuranceTariff>>,
    patients: RwLock<HashMap<PatientId, PatientProfile>>,
    policies: RwLock<Vec<PatientInsurance>>,
    rules: RwLock<Vec<BusinessRule>>,
    unavailable: AtomicBool,
}

impl InMemoryCoverageStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded from a snapshot
    ///
    /// # Errors
    ///
    /// `PortError::InvalidData` when a rule definition does not compile.
    pub async fn from_snapshot(snapshot: CatalogSnapshot) -> Result<Self, PortError> {
        let store = Self::new();
        for plan in snapshot.plans {
            store.add_plan(plan).await;
        }
        for service in snapshot.services {
            store.add_service(service).await;
        }
        for plan_service in snapshot.plan_services {
            store.add_plan_service(plan_service).await;
        }
        for tariff in snapshot.tariffs {
            store.add_tariff(tariff).await;
        }
        for patient in snapshot.patients {
            store.add_patient(patient).await;
        }
        for policy in snapshot.policies {
            store.policies.write().await.push(policy);
        }
        for definition in snapshot.rules {
            store
                .add_rule_definition(definition)
                .await
                .map_err(|e| PortError::invalid_data(e.to_string()))?;
        }
        Ok(store)
    }

    /// Parses a snapshot from JSON
    pub async fn from_json(json: &str) -> Result<Self, PortError> {
        let snapshot: CatalogSnapshot = serde_json::from_str(json)
            .map_err(|e| PortError::invalid_data(format!("catalog snapshot: {}", e)))?;
        Self::from_snapshot(snapshot).await
    }

    /// Reads a snapshot file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, PortError> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await.map_err(|e| PortError::Connection {
            message: format!("failed to read {}", path.display()),
            source: Some(Box::new(e)),
        })?;
        let store = Self::from_json(&json).await?;
        info!(path = %path.display(), "Catalog snapshot loaded");
        Ok(store)
    }

    pub async fn add_plan(&self, plan: InsurancePlan) {
        self.plans.write().await.insert(plan.id, plan);
    }

    pub async fn add_service(&self, service: MedicalService) {
        self.services.write().await.insert(service.id, service);
    }

    pub async fn add_plan_service(&self, plan_service: PlanService) {
        self.plan_services
            .write()
            .await
            .insert((plan_service.plan_id, plan_service.service_id), plan_service);
    }

    /// Adds a tariff, replacing one with the same id
    pub async fn add_tariff(&self, tariff: InsuranceTariff) {
        let mut tariffs = self.tariffs.write().await;
        tariffs.retain(|t| t.id != tariff.id);
        tariffs.push(tariff);
    }

    pub async fn add_patient(&self, patient: PatientProfile) {
        self.patients.write().await.insert(patient.id, patient);
    }

    /// Enrolls a patient in a plan
    ///
    /// The patient's previously active policy of the same kind (primary or
    /// supplementary) is deactivated.
    pub async fn enroll(&self, policy: PatientInsurance) {
        let mut policies = self.policies.write().await;
        for existing in policies.iter_mut().filter(|p| {
            p.patient_id == policy.patient_id && p.is_primary == policy.is_primary && p.is_active
        }) {
            debug!(policy_number = %existing.policy_number, "Deactivating replaced policy");
            existing.deactivate();
        }
        policies.push(policy);
    }

    pub async fn add_rule(&self, rule: BusinessRule) {
        let mut rules = self.rules.write().await;
        rules.retain(|r| r.id != rule.id);
        rules.push(rule);
    }

    /// Compiles and adds a stored rule
    pub async fn add_rule_definition(&self, definition: RuleDefinition) -> Result<(), RulesError> {
        let rule = BusinessRule::compile(definition)?;
        self.add_rule(rule).await;
        Ok(())
    }

    /// All policies of a patient, inactive ones included
    pub async fn policies_of(&self, patient_id: PatientId) -> Vec<PatientInsurance> {
        self.policies
            .read()
            .await
            .iter()
            .filter(|p| p.patient_id == patient_id)
            .cloned()
            .collect()
    }

    /// Makes every port call fail with a connection error
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), PortError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PortError::connection("coverage store unavailable"));
        }
        Ok(())
    }

    async fn active_policy(
        &self,
        patient_id: PatientId,
        date: NaiveDate,
        primary: bool,
    ) -> Result<Option<PatientInsurance>, PortError> {
        self.ensure_available()?;
        Ok(self
            .policies
            .read()
            .await
            .iter()
            .filter(|p| p.patient_id == patient_id && p.is_primary == primary && p.is_active_on(date))
            .max_by_key(|p| (p.start_date, p.id))
            .cloned())
    }
}

impl DomainPort for InMemoryCoverageStore {}

#[async_trait]
impl HealthCheckable for InMemoryCoverageStore {
    async fn health_check(&self) -> HealthCheckResult {
        let started = Instant::now();
        let (status, message) = if self.unavailable.load(Ordering::SeqCst) {
            (AdapterHealth::Unhealthy, "store marked unavailable".to_string())
        } else {
            let plans = self.plans.read().await.len();
            let rules = self.rules.read().await.len();
            (
                AdapterHealth::Healthy,
                format!("{} plans, {} rules loaded", plans, rules),
            )
        };
        HealthCheckResult {
            adapter_id: "in-memory-coverage-store".to_string(),
            status,
            latency_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            message: Some(message),
            checked_at: Utc::now(),
        }
    }
}

#[async_trait]
impl PlanCatalogPort for InMemoryCoverageStore {
    async fn get_plan(&self, plan_id: PlanId) -> Result<Option<InsurancePlan>, PortError> {
        self.ensure_available()?;
        Ok(self.plans.read().await.get(&plan_id).cloned())
    }

    async fn get_plan_service(
        &self,
        plan_id: PlanId,
        service_id: ServiceId,
    ) -> Result<Option<PlanService>, PortError> {
        self.ensure_available()?;
        Ok(self.plan_services.read().await.get(&(plan_id, service_id)).cloned())
    }

    async fn get_service(&self, service_id: ServiceId) -> Result<Option<MedicalService>, PortError> {
        self.ensure_available()?;
        Ok(self.services.read().await.get(&service_id).cloned())
    }

    async fn find_tariff(
        &self,
        plan_id: PlanId,
        service_id: ServiceId,
        insurance_type: InsuranceType,
    ) -> Result<Option<InsuranceTariff>, PortError> {
        self.ensure_available()?;
        let tariffs = self.tariffs.read().await;
        let latest_for = |target: ServiceId| {
            tariffs
                .iter()
                .filter(|t| {
                    t.is_usable()
                        && t.plan_id == plan_id
                        && t.insurance_type == insurance_type
                        && t.service_id == target
                })
                .max_by_key(|t| (t.created_at, t.id))
                .cloned()
        };
        Ok(latest_for(service_id).or_else(|| latest_for(ServiceId::WILDCARD)))
    }

    async fn tariffs_for_plan(&self, plan_id: PlanId) -> Result<Vec<InsuranceTariff>, PortError> {
        self.ensure_available()?;
        Ok(self
            .tariffs
            .read()
            .await
            .iter()
            .filter(|t| t.plan_id == plan_id && !t.is_deleted)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PatientInsurancePort for InMemoryCoverageStore {
    async fn get_patient(&self, patient_id: PatientId) -> Result<Option<PatientProfile>, PortError> {
        self.ensure_available()?;
        Ok(self.patients.read().await.get(&patient_id).cloned())
    }

    async fn active_primary(
        &self,
        patient_id: PatientId,
        date: NaiveDate,
    ) -> Result<Option<PatientInsurance>, PortError> {
        self.active_policy(patient_id, date, true).await
    }

    async fn active_supplementary(
        &self,
        patient_id: PatientId,
        date: NaiveDate,
    ) -> Result<Option<PatientInsurance>, PortError> {
        self.active_policy(patient_id, date, false).await
    }
}

#[async_trait]
impl RuleRepositoryPort for InMemoryCoverageStore {
    async fn find_rules(
        &self,
        rule_type: RuleType,
        plan_id: PlanId,
        service_category_id: Option<ServiceCategoryId>,
    ) -> Result<Vec<BusinessRule>, PortError> {
        self.ensure_available()?;
        Ok(self
            .rules
            .read()
            .await
            .iter()
            .filter(|r| r.rule_type == rule_type && r.in_scope(plan_id, service_category_id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use core_kernel::{Money, PatientInsuranceId, Percentage, TariffId};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn policy(id: i64, primary: bool, plan: i64) -> PatientInsurance {
        PatientInsurance {
            id: PatientInsuranceId::new(id),
            patient_id: PatientId::new(1),
            plan_id: PlanId::new(plan),
            policy_number: format!("POL-{}", id),
            is_primary: primary,
            start_date: date(2024, 1, 1),
            end_date: None,
            is_active: true,
        }
    }

    fn tariff(id: i64, service: ServiceId) -> InsuranceTariff {
        InsuranceTariff::primary(
            TariffId::new(id),
            PlanId::new(1),
            service,
            Money::new(dec!(100)),
            Percentage::new(dec!(70)).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_enroll_deactivates_previous_policy() {
        let store = InMemoryCoverageStore::new();
        store.enroll(policy(1, true, 1)).await;
        store.enroll(policy(2, false, 2)).await;
        store.enroll(policy(3, true, 3)).await;

        let active = store.active_primary(PatientId::new(1), date(2024, 6, 1)).await.unwrap();
        assert_eq!(active.map(|p| p.plan_id), Some(PlanId::new(3)));

        let policies = store.policies_of(PatientId::new(1)).await;
        assert_eq!(policies.len(), 3);
        assert_eq!(policies.iter().filter(|p| p.is_active).count(), 2);
    }

    #[tokio::test]
    async fn test_find_tariff_falls_back_to_wildcard() {
        let store = InMemoryCoverageStore::new();
        store.add_tariff(tariff(1, ServiceId::WILDCARD)).await;
        store.add_tariff(tariff(2, ServiceId::new(10))).await;

        let exact = store
            .find_tariff(PlanId::new(1), ServiceId::new(10), InsuranceType::Primary)
            .await
            .unwrap();
        assert_eq!(exact.map(|t| t.id), Some(TariffId::new(2)));

        let wildcard = store
            .find_tariff(PlanId::new(1), ServiceId::new(11), InsuranceType::Primary)
            .await
            .unwrap();
        assert_eq!(wildcard.map(|t| t.id), Some(TariffId::new(1)));
    }

    #[tokio::test]
    async fn test_deleted_tariff_not_found() {
        let store = InMemoryCoverageStore::new();
        let mut deleted = tariff(1, ServiceId::new(10));
        deleted.is_deleted = true;
        deleted.is_active = false;
        store.add_tariff(deleted).await;

        let found = store
            .find_tariff(PlanId::new(1), ServiceId::new(10), InsuranceType::Primary)
            .await
            .unwrap();
        assert!(found.is_none());
        assert!(store.tariffs_for_plan(PlanId::new(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let store = InMemoryCoverageStore::new();
        store.set_unavailable(true);
        let err = store.get_plan(PlanId::new(1)).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(store.health_check().await.status, AdapterHealth::Unhealthy);
    }

    #[tokio::test]
    async fn test_snapshot_rejects_bad_rule() {
        let json = r#"{
            "rules": [{
                "id": 1, "rule_type": "deductible", "priority": 1,
                "start_date": "2025-01-01", "end_date": "2024-01-01",
                "actions": { "set_deductible": 5 }
            }]
        }"#;
        let err = InMemoryCoverageStore::from_json(json).await.unwrap_err();
        assert!(matches!(err, PortError::InvalidData { .. }));
    }
}
