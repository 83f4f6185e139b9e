//! Rule evaluation and tariff validation handlers

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use validator::Validate;

use core_kernel::{Money, PatientId, ServiceId};
use domain_coverage::{CalculationOutcome, InsuranceTariff, RuleEvaluation, ValidationReport};

use crate::dto::rules::RuleEvaluationRequest;
use crate::{error::ApiError, AppState};

/// Evaluates the rules of one type against a calculation context
pub async fn evaluate_rules(
    State(state): State<AppState>,
    payload: Result<Json<RuleEvaluationRequest>, JsonRejection>,
) -> Result<Json<CalculationOutcome<RuleEvaluation>>, ApiError> {
    let Json(request) = payload?;
    request.validate()?;

    let date = request.calculation_date.unwrap_or_else(|| state.clock.today());
    let evaluation = state
        .service
        .evaluate_rules(
            PatientId::new(request.patient_id),
            ServiceId::new(request.service_id),
            Money::new(request.service_amount),
            date,
            request.rule_type,
        )
        .await?;
    Ok(Json(CalculationOutcome::success(evaluation)))
}

/// Checks a tariff against the financial and business invariants
///
/// Violations are reported in the payload; the request itself succeeds.
pub async fn validate_tariff(
    State(state): State<AppState>,
    payload: Result<Json<InsuranceTariff>, JsonRejection>,
) -> Result<Json<CalculationOutcome<ValidationReport>>, ApiError> {
    let Json(tariff) = payload?;
    let report = state.service.validate_tariff(&tariff).await?;
    Ok(Json(CalculationOutcome::success(report)))
}
