//! Monitoring handlers

use axum::{extract::State, Json};

use domain_coverage::{CalculationOutcome, MonitoringSummary};

use crate::AppState;

/// Aggregated calculation statistics since startup
pub async fn summary(State(state): State<AppState>) -> Json<CalculationOutcome<MonitoringSummary>> {
    Json(CalculationOutcome::success(state.monitor.summary()))
}
