//! Calculation handlers

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use validator::Validate;

use core_kernel::{Money, PatientId, ServiceId};
use domain_coverage::{
    CalculationOutcome, CalculationResult, CombinedCalculationResult,
    SupplementaryCalculationResult,
};

use crate::dto::calculation::{BatchRequest, CalculationRequest, SupplementaryRequest};
use crate::{error::ApiError, AppState};

/// Calculates primary plus supplementary coverage
pub async fn calculate_combined(
    State(state): State<AppState>,
    payload: Result<Json<CalculationRequest>, JsonRejection>,
) -> Result<Json<CalculationOutcome<CombinedCalculationResult>>, ApiError> {
    let Json(request) = payload?;
    request.validate()?;

    let date = request.calculation_date.unwrap_or_else(|| state.clock.today());
    let result = state
        .service
        .calculate(request.patient_id(), request.service_id(), request.amount(), date)
        .await?;
    Ok(Json(CalculationOutcome::success(result)))
}

/// Calculates primary coverage only
pub async fn calculate_primary(
    State(state): State<AppState>,
    payload: Result<Json<CalculationRequest>, JsonRejection>,
) -> Result<Json<CalculationOutcome<CalculationResult>>, ApiError> {
    let Json(request) = payload?;
    request.validate()?;

    let date = request.calculation_date.unwrap_or_else(|| state.clock.today());
    let result = state
        .service
        .calculate_primary(request.patient_id(), request.service_id(), request.amount(), date)
        .await?;
    Ok(Json(CalculationOutcome::success(result)))
}

/// Calculates supplementary coverage for a known primary coverage
pub async fn calculate_supplementary(
    State(state): State<AppState>,
    payload: Result<Json<SupplementaryRequest>, JsonRejection>,
) -> Result<Json<CalculationOutcome<SupplementaryCalculationResult>>, ApiError> {
    let Json(request) = payload?;
    request.validate()?;

    let date = request.calculation_date.unwrap_or_else(|| state.clock.today());
    let result = state
        .service
        .calculate_supplementary(
            PatientId::new(request.patient_id),
            ServiceId::new(request.service_id),
            Money::new(request.service_amount),
            Money::new(request.primary_coverage),
            date,
        )
        .await?;
    Ok(Json(CalculationOutcome::success(result)))
}

/// Calculates combined coverage for several services
pub async fn calculate_batch(
    State(state): State<AppState>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<CalculationOutcome<Vec<CombinedCalculationResult>>>, ApiError> {
    let Json(request) = payload?;
    request.validate()?;

    let (services, amounts) = request.split_lines();
    let results = state
        .service
        .calculate_for_services(
            PatientId::new(request.patient_id),
            &services,
            &amounts,
            request.calculation_date,
        )
        .await?;
    Ok(Json(CalculationOutcome::success(results)))
}
