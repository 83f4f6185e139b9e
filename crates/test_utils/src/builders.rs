//! Test Data Builders
//!
//! Provides builder patterns for constructing test data with sensible defaults.
//! These builders allow tests to specify only the relevant fields while using
//! defaults for everything else.

use chrono::{DateTime, NaiveDate, Utc};
use core_kernel::{Clock, Money, Percentage, PlanId, RuleId, ServiceCategoryId, ServiceId, TariffId};
use domain_coverage::{
    CombinedCoverageService, CoverageCache, EngineConfig, InMemoryCoverageStore, InMemoryMonitor,
    InsuranceTariff, InsuranceType, RuleDefinition, RuleType,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::fixtures::{IdFixtures, TemporalFixtures};

/// Builder for constructing test tariffs
pub struct TestTariffBuilder {
    id: TariffId,
    plan_id: PlanId,
    service_id: ServiceId,
    insurance_type: InsuranceType,
    price: Money,
    patient_share: Option<Money>,
    insurer_share: Option<Money>,
    insurer_percent: Percentage,
    max_payment: Option<Money>,
    is_active: bool,
    is_deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl Default for TestTariffBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestTariffBuilder {
    /// Creates a primary 70% tariff of 1,000 for the consultation service
    pub fn new() -> Self {
        Self {
            id: TariffId::new(100),
            plan_id: IdFixtures::PRIMARY_PLAN,
            service_id: IdFixtures::CONSULTATION,
            insurance_type: InsuranceType::Primary,
            price: Money::new(dec!(1000)),
            patient_share: None,
            insurer_share: None,
            insurer_percent: Percentage::clamped(dec!(70)),
            max_payment: None,
            is_active: true,
            is_deleted: false,
            created_at: TemporalFixtures::tariff_created_at(),
            updated_at: None,
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = TariffId::new(id);
        self
    }

    pub fn with_plan(mut self, plan_id: PlanId) -> Self {
        self.plan_id = plan_id;
        self
    }

    pub fn with_service(mut self, service_id: ServiceId) -> Self {
        self.service_id = service_id;
        self
    }

    pub fn supplementary(mut self, max_payment: Option<Decimal>) -> Self {
        self.insurance_type = InsuranceType::Supplementary;
        self.max_payment = max_payment.map(Money::new);
        self
    }

    pub fn with_price(mut self, price: Decimal) -> Self {
        self.price = Money::new(price);
        self
    }

    pub fn with_insurer_percent(mut self, percent: Decimal) -> Self {
        self.insurer_percent = Percentage::clamped(percent);
        self
    }

    /// Overrides the computed shares
    pub fn with_shares(mut self, patient: Decimal, insurer: Decimal) -> Self {
        self.patient_share = Some(Money::new(patient));
        self.insurer_share = Some(Money::new(insurer));
        self
    }

    pub fn deleted(mut self) -> Self {
        self.is_deleted = true;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    pub fn updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }

    /// Builds the tariff
    pub fn build(self) -> InsuranceTariff {
        let mut tariff = match self.insurance_type {
            InsuranceType::Primary => InsuranceTariff::primary(
                self.id,
                self.plan_id,
                self.service_id,
                self.price,
                self.insurer_percent,
                self.created_at,
            ),
            InsuranceType::Supplementary => InsuranceTariff::supplementary(
                self.id,
                self.plan_id,
                self.service_id,
                self.price,
                self.insurer_percent,
                self.max_payment,
                self.created_at,
            ),
        }
        .unwrap();
        if let Some(patient_share) = self.patient_share {
            tariff.patient_share = patient_share;
        }
        if let Some(insurer_share) = self.insurer_share {
            tariff.insurer_share = insurer_share;
        }
        tariff.is_active = self.is_active;
        tariff.is_deleted = self.is_deleted;
        tariff.updated_at = self.updated_at;
        tariff
    }
}

/// Builder for constructing stored rule definitions
pub struct TestRuleBuilder {
    id: RuleId,
    name: String,
    rule_type: RuleType,
    priority: i32,
    plan_id: Option<PlanId>,
    service_category_id: Option<ServiceCategoryId>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    is_active: bool,
    conditions: Map<String, Value>,
    actions: Map<String, Value>,
}

impl TestRuleBuilder {
    /// Creates an active, unscoped rule of the given type
    pub fn new(id: i64, rule_type: RuleType) -> Self {
        Self {
            id: RuleId::new(id),
            name: format!("rule {}", id),
            rule_type,
            priority: 0,
            plan_id: None,
            service_category_id: None,
            start_date: None,
            end_date: None,
            is_active: true,
            conditions: Map::new(),
            actions: Map::new(),
        }
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn for_plan(mut self, plan_id: PlanId) -> Self {
        self.plan_id = Some(plan_id);
        self
    }

    pub fn for_category(mut self, category: ServiceCategoryId) -> Self {
        self.service_category_id = Some(category);
        self
    }

    pub fn valid_between(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn condition(mut self, key: &str, value: Value) -> Self {
        self.conditions.insert(key.to_string(), value);
        self
    }

    pub fn action(mut self, key: &str, value: Value) -> Self {
        self.actions.insert(key.to_string(), value);
        self
    }

    pub fn build(self) -> RuleDefinition {
        RuleDefinition {
            id: self.id,
            name: self.name,
            rule_type: self.rule_type,
            priority: self.priority,
            plan_id: self.plan_id,
            service_category_id: self.service_category_id,
            start_date: self.start_date,
            end_date: self.end_date,
            is_active: self.is_active,
            conditions: self.conditions,
            actions: self.actions,
        }
    }
}

/// Builder wiring a `CombinedCoverageService` for tests
///
/// The service reads a fixed clock and records into an [`InMemoryMonitor`]
/// the test can inspect.
pub struct TestEngineBuilder {
    store: Arc<InMemoryCoverageStore>,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    cache: Option<Arc<dyn CoverageCache>>,
}

impl TestEngineBuilder {
    pub fn new(store: Arc<InMemoryCoverageStore>) -> Self {
        Self {
            store,
            config: EngineConfig::default(),
            clock: TemporalFixtures::clock(),
            cache: None,
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn CoverageCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Builds the service and returns it with its monitor
    pub fn build(self) -> (CombinedCoverageService, Arc<InMemoryMonitor>) {
        let monitor = Arc::new(InMemoryMonitor::new(self.config.monitor_capacity));
        let mut service = CombinedCoverageService::new(
            self.store.clone(),
            self.store.clone(),
            self.store,
            self.config,
        )
        .with_clock(self.clock)
        .with_monitor(monitor.clone());
        if let Some(cache) = self.cache {
            service = service.with_cache(cache);
        }
        (service, monitor)
    }
}
