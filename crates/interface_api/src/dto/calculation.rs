//! Calculation DTOs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::{Money, PatientId, ServiceId};

use super::{non_negative_amount, positive_amount};

/// Combined or primary calculation for one service
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CalculationRequest {
    #[validate(range(min = 1))]
    pub patient_id: i64,
    #[validate(range(min = 1))]
    pub service_id: i64,
    #[validate(custom(function = "positive_amount"))]
    pub service_amount: Decimal,
    /// Defaults to today
    pub calculation_date: Option<NaiveDate>,
}

impl CalculationRequest {
    pub fn patient_id(&self) -> PatientId {
        PatientId::new(self.patient_id)
    }

    pub fn service_id(&self) -> ServiceId {
        ServiceId::new(self.service_id)
    }

    pub fn amount(&self) -> Money {
        Money::new(self.service_amount)
    }
}

/// Supplementary calculation on top of a known primary coverage
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SupplementaryRequest {
    #[validate(range(min = 1))]
    pub patient_id: i64,
    #[validate(range(min = 1))]
    pub service_id: i64,
    #[validate(custom(function = "positive_amount"))]
    pub service_amount: Decimal,
    #[validate(custom(function = "non_negative_amount"))]
    pub primary_coverage: Decimal,
    pub calculation_date: Option<NaiveDate>,
}

/// One invoice line of a batch
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BatchLine {
    #[validate(range(min = 1))]
    pub service_id: i64,
    #[validate(custom(function = "positive_amount"))]
    pub service_amount: Decimal,
}

/// Combined calculation for several services of one patient
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BatchRequest {
    #[validate(range(min = 1))]
    pub patient_id: i64,
    #[validate(length(min = 1), nested)]
    pub lines: Vec<BatchLine>,
    pub calculation_date: Option<NaiveDate>,
}

impl BatchRequest {
    /// Splits the lines into the parallel slices the engine expects
    pub fn split_lines(&self) -> (Vec<ServiceId>, Vec<Money>) {
        self.lines
            .iter()
            .map(|line| (ServiceId::new(line.service_id), Money::new(line.service_amount)))
            .unzip()
    }
}
