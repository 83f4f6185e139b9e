//! Combined insurance orchestration
//!
//! `CombinedCoverageService` drives a full calculation:
//!
//! 1. validate the request
//! 2. resolve the active primary policy, its plan, the service, the
//!    plan-service override and the primary tariff
//! 3. evaluate payment-limit, coverage-percent, deductible and
//!    supplementary-insurance rules
//! 4. calculate primary coverage
//! 5. resolve the optional supplementary policy and calculate supplementary
//!    coverage on what primary insurance left for the patient
//!
//! All collaborators are injected. Every entry point reports to the
//! monitoring sink whether it succeeds or fails.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use core_kernel::{
    temporal::add_days, Clock, Money, MoneyError, PatientId, PlanId, ServiceId, SystemClock,
};

use crate::cache::{CoverageCache, SupplementaryCacheKey};
use crate::config::{EngineConfig, MissingSupplementaryTariff};
use crate::context::InsuranceCalculationContext;
use crate::error::CoverageError;
use crate::model::{InsuranceTariff, InsuranceType};
use crate::monitoring::{CalculationEvent, CalculationKind, ErrorEvent, MonitoringSink, TracingMonitor};
use crate::ports::{PatientInsurancePort, PlanCatalogPort, RuleRepositoryPort};
use crate::primary::{calculate_with_parameters, CoverageParameters};
use crate::results::{CalculationResult, CombinedCalculationResult, SupplementaryCalculationResult};
use crate::rules::RuleType;
use crate::rules_engine::{default_coverage_percent, BusinessRuleEngine, RuleEvaluation};
use crate::supplementary::{calculate_supplementary, patient_liable};
use crate::validation::{check_primary, check_supplementary, TariffValidator, ValidationReport};

const SYSTEM_FAILURE_MESSAGE: &str = "error calculating combined insurance";

/// Primary calculation plus what the supplementary step needs from it
struct PrimaryComputation {
    plan_id: PlanId,
    result: CalculationResult,
    supplementary_applicable: bool,
}

/// Coordinates plan lookups, rule evaluation and both calculators
pub struct CombinedCoverageService {
    catalog: Arc<dyn PlanCatalogPort>,
    patients: Arc<dyn PatientInsurancePort>,
    rules: BusinessRuleEngine,
    config: EngineConfig,
    monitor: Arc<dyn MonitoringSink>,
    cache: Option<Arc<dyn CoverageCache>>,
    clock: Arc<dyn Clock>,
}

impl CombinedCoverageService {
    /// Creates a service logging events through tracing, without a cache and
    /// reading the system clock
    pub fn new(
        catalog: Arc<dyn PlanCatalogPort>,
        patients: Arc<dyn PatientInsurancePort>,
        rule_repository: Arc<dyn RuleRepositoryPort>,
        config: EngineConfig,
    ) -> Self {
        Self {
            catalog,
            patients,
            rules: BusinessRuleEngine::new(rule_repository, config.unknown_condition_policy),
            config,
            monitor: Arc::new(TracingMonitor),
            cache: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_monitor(mut self, monitor: Arc<dyn MonitoringSink>) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn CoverageCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn rule_engine(&self) -> &BusinessRuleEngine {
        &self.rules
    }

    // ========================================================================
    // Entry points
    // ========================================================================

    /// Calculates primary and (when present) supplementary coverage
    ///
    /// # Errors
    ///
    /// * `Validation` for invalid ids, non-positive amounts, dates too far in
    ///   the future or an exceeded payment limit
    /// * `NotFound` when the primary policy, plan, service or tariff is missing
    /// * `System` when a data source fails
    #[instrument(skip(self), fields(patient_id = %patient_id, service_id = %service_id))]
    pub async fn calculate(
        &self,
        patient_id: PatientId,
        service_id: ServiceId,
        amount: Money,
        date: NaiveDate,
    ) -> Result<CombinedCalculationResult, CoverageError> {
        let started = Instant::now();
        let result = self.run_combined(patient_id, service_id, amount, date).await;
        self.finish(
            CalculationKind::Combined,
            patient_id,
            Some(service_id),
            amount,
            started,
            result,
            |r| Ok((r.total_coverage, r.final_patient_share)),
        )
    }

    /// Calculates primary coverage only
    #[instrument(skip(self), fields(patient_id = %patient_id, service_id = %service_id))]
    pub async fn calculate_primary(
        &self,
        patient_id: PatientId,
        service_id: ServiceId,
        amount: Money,
        date: NaiveDate,
    ) -> Result<CalculationResult, CoverageError> {
        let started = Instant::now();
        let result = self.run_primary(patient_id, service_id, amount, date).await;
        self.finish(
            CalculationKind::Primary,
            patient_id,
            Some(service_id),
            amount,
            started,
            result,
            |r| Ok((r.insurance_coverage, r.patient_payment)),
        )
    }

    /// Calculates supplementary coverage for a known primary coverage
    ///
    /// Results are memoised when a cache is configured.
    #[instrument(skip(self), fields(patient_id = %patient_id, service_id = %service_id))]
    pub async fn calculate_supplementary(
        &self,
        patient_id: PatientId,
        service_id: ServiceId,
        amount: Money,
        primary_coverage: Money,
        date: NaiveDate,
    ) -> Result<SupplementaryCalculationResult, CoverageError> {
        let started = Instant::now();
        let result = self
            .run_supplementary(patient_id, service_id, amount, primary_coverage, date)
            .await;
        self.finish(
            CalculationKind::Supplementary,
            patient_id,
            Some(service_id),
            amount,
            started,
            result,
            |r| Ok((r.total_coverage, r.final_patient_share)),
        )
    }

    /// Calculates combined coverage for several invoice lines
    ///
    /// Lines that fail are logged and left out; the others keep their input
    /// order. `date` defaults to today.
    ///
    /// # Errors
    ///
    /// `Validation` when the batch is empty or the two slices differ in length.
    #[instrument(skip(self, service_ids, amounts), fields(patient_id = %patient_id, lines = service_ids.len()))]
    pub async fn calculate_for_services(
        &self,
        patient_id: PatientId,
        service_ids: &[ServiceId],
        amounts: &[Money],
        date: Option<NaiveDate>,
    ) -> Result<Vec<CombinedCalculationResult>, CoverageError> {
        let started = Instant::now();
        let (batch_amount, result) = match Money::checked_sum(amounts) {
            Ok(total) => (
                total,
                self.run_batch(patient_id, service_ids, amounts, date).await,
            ),
            Err(err) => {
                warn!(error = %err, "Batch total is not representable");
                (Money::new(Decimal::MAX), Err(err.into()))
            }
        };
        self.finish(
            CalculationKind::Batch,
            patient_id,
            None,
            batch_amount,
            started,
            result,
            |lines| {
                let coverage: Vec<Money> = lines.iter().map(|l| l.total_coverage).collect();
                let shares: Vec<Money> = lines.iter().map(|l| l.final_patient_share).collect();
                Ok((Money::checked_sum(&coverage)?, Money::checked_sum(&shares)?))
            },
        )
    }

    /// Evaluates one rule type against the context of a calculation
    pub async fn evaluate_rules(
        &self,
        patient_id: PatientId,
        service_id: ServiceId,
        amount: Money,
        date: NaiveDate,
        rule_type: RuleType,
    ) -> Result<RuleEvaluation, CoverageError> {
        self.run_rule_evaluation(patient_id, service_id, amount, date, rule_type)
            .await
            .map_err(|err| self.surface(err))
    }

    /// Checks a tariff against every invariant, including duplicates within
    /// its plan
    pub async fn validate_tariff(
        &self,
        tariff: &InsuranceTariff,
    ) -> Result<ValidationReport, CoverageError> {
        let existing = self
            .catalog
            .tariffs_for_plan(tariff.plan_id)
            .await
            .map_err(|err| self.surface(err.into()))?;
        let validator = TariffValidator::new(self.config.share_tolerance, self.clock.clone());
        Ok(validator.validate_all(tariff, &existing))
    }

    // ========================================================================
    // Pipeline steps
    // ========================================================================

    async fn run_combined(
        &self,
        patient_id: PatientId,
        service_id: ServiceId,
        amount: Money,
        date: NaiveDate,
    ) -> Result<CombinedCalculationResult, CoverageError> {
        self.validate_request(patient_id, service_id, amount, date)?;
        let primary = self.compute_primary(patient_id, service_id, amount, date).await?;

        if !primary.supplementary_applicable {
            debug!("Supplementary insurance disabled by rule");
            return Ok(CombinedCalculationResult::primary_only(
                patient_id,
                service_id,
                date,
                primary.plan_id,
                primary.result,
            ));
        }

        let Some(policy) = self.patients.active_supplementary(patient_id, date).await? else {
            debug!("No active supplementary insurance");
            return Ok(CombinedCalculationResult::primary_only(
                patient_id,
                service_id,
                date,
                primary.plan_id,
                primary.result,
            ));
        };

        let plan = self
            .catalog
            .get_plan(policy.plan_id)
            .await?
            .ok_or_else(|| CoverageError::not_found("supplementary insurance plan not found"))?;
        if !plan.is_effective_on(date) {
            debug!(plan_id = %plan.id, "Supplementary plan not effective on calculation date");
            return Ok(CombinedCalculationResult::primary_only(
                patient_id,
                service_id,
                date,
                primary.plan_id,
                primary.result,
            ));
        }

        let tariff = self
            .catalog
            .find_tariff(plan.id, service_id, InsuranceType::Supplementary)
            .await?;
        let supplementary = self.supplementary_for(
            amount,
            primary.result.insurance_coverage,
            tariff.as_ref(),
            date,
        )?;

        self.check_results(&primary.result, Some(&supplementary));

        Ok(CombinedCalculationResult::with_supplementary(
            patient_id,
            service_id,
            date,
            primary.plan_id,
            primary.result,
            plan.id,
            tariff.and_then(|t| t.supplementary_coverage_percent),
            &supplementary,
        ))
    }

    async fn run_primary(
        &self,
        patient_id: PatientId,
        service_id: ServiceId,
        amount: Money,
        date: NaiveDate,
    ) -> Result<CalculationResult, CoverageError> {
        self.validate_request(patient_id, service_id, amount, date)?;
        let primary = self.compute_primary(patient_id, service_id, amount, date).await?;
        Ok(primary.result)
    }

    async fn run_batch(
        &self,
        patient_id: PatientId,
        service_ids: &[ServiceId],
        amounts: &[Money],
        date: Option<NaiveDate>,
    ) -> Result<Vec<CombinedCalculationResult>, CoverageError> {
        if service_ids.is_empty() {
            return Err(CoverageError::validation("no services to calculate"));
        }
        if service_ids.len() != amounts.len() {
            return Err(CoverageError::validation(format!(
                "{} services but {} amounts",
                service_ids.len(),
                amounts.len()
            )));
        }

        let date = date.unwrap_or_else(|| self.clock.today());
        let mut results = Vec::with_capacity(service_ids.len());
        for (service_id, amount) in service_ids.iter().zip(amounts) {
            match self.calculate(patient_id, *service_id, *amount, date).await {
                Ok(line) => results.push(line),
                Err(err) => warn!(
                    service_id = %service_id,
                    category = err.category().as_str(),
                    error = %err,
                    "Batch line skipped"
                ),
            }
        }
        Ok(results)
    }

    async fn run_rule_evaluation(
        &self,
        patient_id: PatientId,
        service_id: ServiceId,
        amount: Money,
        date: NaiveDate,
        rule_type: RuleType,
    ) -> Result<RuleEvaluation, CoverageError> {
        self.validate_request(patient_id, service_id, amount, date)?;
        let context = self.build_context(patient_id, service_id, amount, date).await?;
        self.rules.evaluate(rule_type, &context).await
    }

    async fn run_supplementary(
        &self,
        patient_id: PatientId,
        service_id: ServiceId,
        amount: Money,
        primary_coverage: Money,
        date: NaiveDate,
    ) -> Result<SupplementaryCalculationResult, CoverageError> {
        self.validate_request(patient_id, service_id, amount, date)?;
        if primary_coverage.is_negative() {
            return Err(CoverageError::validation("primary coverage must not be negative"));
        }

        let key = SupplementaryCacheKey {
            patient_id,
            service_id,
            service_amount: amount,
            primary_coverage,
            calculation_date: date,
        };
        if let Some(cached) = self.cache.as_ref().and_then(|cache| cache.get(&key)) {
            debug!("Supplementary result served from cache");
            return Ok(cached);
        }

        let policy = self
            .patients
            .active_supplementary(patient_id, date)
            .await?
            .ok_or_else(|| CoverageError::not_found("active supplementary insurance not found"))?;
        let plan = self
            .catalog
            .get_plan(policy.plan_id)
            .await?
            .filter(|plan| plan.is_effective_on(date))
            .ok_or_else(|| CoverageError::not_found("supplementary insurance plan not found"))?;
        let tariff = self
            .catalog
            .find_tariff(plan.id, service_id, InsuranceType::Supplementary)
            .await?;

        let result = self.supplementary_for(amount, primary_coverage, tariff.as_ref(), date)?;
        if self.config.validate_results {
            self.warn_on_violations("supplementary", check_supplementary(&result));
        }

        if let Some(cache) = &self.cache {
            cache.insert(key, result.clone());
        }
        Ok(result)
    }

    async fn compute_primary(
        &self,
        patient_id: PatientId,
        service_id: ServiceId,
        amount: Money,
        date: NaiveDate,
    ) -> Result<PrimaryComputation, CoverageError> {
        let context = self.build_context(patient_id, service_id, amount, date).await?;

        let limit = self.rules.check_payment_limit(&context).await?;
        let coverage = self.rules.evaluate(RuleType::CoveragePercent, &context).await?;
        let deductible = self.rules.evaluate(RuleType::Deductible, &context).await?;
        let supplementary_applicable = self.rules.supplementary_applicable(&context).await?;

        let parameters = CoverageParameters {
            deductible: deductible
                .effect
                .deductible
                .unwrap_or_else(|| context.plan.deductible.max_zero()),
            coverage_percent: coverage
                .effect
                .coverage_percent
                .unwrap_or_else(|| default_coverage_percent(&context)),
            max_payment: limit
                .effect
                .max_payment
                .or(coverage.effect.max_payment)
                .or(deductible.effect.max_payment),
            applied_rule: coverage
                .matched_rule
                .or(deductible.matched_rule)
                .or(limit.matched_rule),
        };
        debug!(
            coverage_percent = %parameters.coverage_percent,
            deductible = %parameters.deductible,
            "Coverage parameters resolved"
        );

        let result = calculate_with_parameters(amount, &parameters)?;
        if self.config.validate_results {
            self.warn_on_violations("primary", check_primary(&result));
        }

        Ok(PrimaryComputation {
            plan_id: context.plan.id,
            result,
            supplementary_applicable,
        })
    }

    /// Resolves everything the rule engine and primary calculator look at
    async fn build_context(
        &self,
        patient_id: PatientId,
        service_id: ServiceId,
        amount: Money,
        date: NaiveDate,
    ) -> Result<InsuranceCalculationContext, CoverageError> {
        let policy = self
            .patients
            .active_primary(patient_id, date)
            .await?
            .ok_or_else(|| CoverageError::not_found("active primary insurance not found"))?;

        let plan = self
            .catalog
            .get_plan(policy.plan_id)
            .await?
            .filter(|plan| plan.is_effective_on(date))
            .ok_or_else(|| CoverageError::not_found("insurance not found"))?;

        let service = self
            .catalog
            .get_service(service_id)
            .await?
            .ok_or_else(|| CoverageError::not_found(format!("service {} not found", service_id)))?;

        let plan_service = self.catalog.get_plan_service(plan.id, service_id).await?;
        if plan_service.as_ref().is_some_and(|ps| !ps.is_covered) {
            return Err(CoverageError::not_found("configuration not found"));
        }

        let tariff = self
            .catalog
            .find_tariff(plan.id, service_id, InsuranceType::Primary)
            .await?
            .ok_or_else(|| {
                CoverageError::not_found(format!(
                    "tariff not found for service {} in plan {}",
                    service_id, plan.id
                ))
            })?;
        debug!(tariff_id = %tariff.id, plan_id = %plan.id, "Primary tariff resolved");

        let patient = self.patients.get_patient(patient_id).await?;

        Ok(
            InsuranceCalculationContext::new(patient_id, service_id, amount, plan, date)
                .with_patient(patient)
                .with_category(Some(service.category_id))
                .with_plan_service(plan_service)
                .with_reference_date(self.clock.today()),
        )
    }

    fn supplementary_for(
        &self,
        amount: Money,
        primary_coverage: Money,
        tariff: Option<&InsuranceTariff>,
        date: NaiveDate,
    ) -> Result<SupplementaryCalculationResult, CoverageError> {
        match (tariff, self.config.missing_supplementary_tariff) {
            (None, MissingSupplementaryTariff::PatientLiable) => {
                warn!("Supplementary tariff missing, patient liable for the remainder");
                patient_liable(amount, primary_coverage, date)
            }
            _ => calculate_supplementary(amount, primary_coverage, tariff, date),
        }
    }

    fn validate_request(
        &self,
        patient_id: PatientId,
        service_id: ServiceId,
        amount: Money,
        date: NaiveDate,
    ) -> Result<(), CoverageError> {
        if !patient_id.is_valid() {
            return Err(CoverageError::validation(format!("invalid patient id {}", patient_id.value())));
        }
        if !service_id.is_valid() {
            return Err(CoverageError::validation(format!("invalid service id {}", service_id.value())));
        }
        if !amount.is_positive() {
            return Err(CoverageError::validation(format!(
                "service amount must be positive, got {}",
                amount
            )));
        }
        let latest = add_days(self.clock.today(), self.config.future_date_tolerance_days)?;
        if date > latest {
            return Err(CoverageError::validation(format!(
                "calculation date {} is in the future",
                date
            )));
        }
        Ok(())
    }

    // ========================================================================
    // Reporting
    // ========================================================================

    fn check_results(
        &self,
        primary: &CalculationResult,
        supplementary: Option<&SupplementaryCalculationResult>,
    ) {
        if !self.config.validate_results {
            return;
        }
        self.warn_on_violations("primary", check_primary(primary));
        if let Some(supplementary) = supplementary {
            self.warn_on_violations("supplementary", check_supplementary(supplementary));
        }
    }

    fn warn_on_violations(&self, stage: &str, report: ValidationReport) {
        if !report.is_valid {
            warn!(stage, errors = %report.joined_errors(), "Calculation result violates invariants");
        }
    }

    /// Replaces data-source and arithmetic failures with a generic message
    fn surface(&self, err: CoverageError) -> CoverageError {
        match err {
            CoverageError::Port(port) => {
                error!(
                    error = %port,
                    transient = port.is_transient(),
                    "Coverage data source failed"
                );
                CoverageError::system(SYSTEM_FAILURE_MESSAGE)
            }
            CoverageError::Money(money) => {
                error!(error = %money, "Coverage arithmetic failed");
                CoverageError::system(SYSTEM_FAILURE_MESSAGE)
            }
            other => other,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn finish<T>(
        &self,
        kind: CalculationKind,
        patient_id: PatientId,
        service_id: Option<ServiceId>,
        amount: Money,
        started: Instant,
        result: Result<T, CoverageError>,
        figures: impl FnOnce(&T) -> Result<(Money, Money), MoneyError>,
    ) -> Result<T, CoverageError> {
        let result = result
            .and_then(|value| {
                let totals = figures(&value)?;
                Ok((value, totals))
            })
            .map_err(|err| self.surface(err));
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let event = CalculationEvent::new(kind, patient_id, service_id, amount, self.clock.now())
            .with_duration_ms(duration_ms);

        match result {
            Ok((value, (total_coverage, final_patient_share))) => {
                info!(
                    kind = kind.as_str(),
                    total_coverage = %total_coverage,
                    patient_share = %final_patient_share,
                    duration_ms,
                    "Coverage calculated"
                );
                self.monitor
                    .record_calculation(event.succeeded(total_coverage, final_patient_share));
                Ok(value)
            }
            Err(err) => {
                self.monitor.record_calculation(event);
                self.monitor.record_error(ErrorEvent::new(
                    kind,
                    patient_id,
                    service_id,
                    err.category(),
                    err.message(),
                    self.clock.now(),
                ));
                Err(err)
            }
        }
    }
}
