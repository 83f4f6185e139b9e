//! Calculation context handed to the business rule engine

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use core_kernel::{Money, PatientId, ServiceCategoryId, ServiceId};
use crate::model::{InsurancePlan, PatientProfile, PlanService};

/// Everything a rule may look at while being evaluated
///
/// Built once per calculation and only ever borrowed immutably.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsuranceCalculationContext {
    pub patient_id: PatientId,
    /// Patient attributes, when the registry knows the patient
    pub patient: Option<PatientProfile>,
    pub service_id: ServiceId,
    pub service_category_id: Option<ServiceCategoryId>,
    pub service_amount: Money,
    pub plan: InsurancePlan,
    pub plan_service: Option<PlanService>,
    /// Date the service was delivered
    pub calculation_date: NaiveDate,
    /// "Today" for age computations
    pub reference_date: NaiveDate,
}

impl InsuranceCalculationContext {
    /// Creates a context; the reference date defaults to the calculation date
    pub fn new(
        patient_id: PatientId,
        service_id: ServiceId,
        service_amount: Money,
        plan: InsurancePlan,
        calculation_date: NaiveDate,
    ) -> Self {
        Self {
            patient_id,
            patient: None,
            service_id,
            service_category_id: None,
            service_amount,
            plan,
            plan_service: None,
            calculation_date,
            reference_date: calculation_date,
        }
    }

    pub fn with_patient(mut self, patient: Option<PatientProfile>) -> Self {
        self.patient = patient;
        self
    }

    pub fn with_category(mut self, category: Option<ServiceCategoryId>) -> Self {
        self.service_category_id = category;
        self
    }

    pub fn with_plan_service(mut self, plan_service: Option<PlanService>) -> Self {
        self.plan_service = plan_service;
        self
    }

    pub fn with_reference_date(mut self, reference_date: NaiveDate) -> Self {
        self.reference_date = reference_date;
        self
    }
}
