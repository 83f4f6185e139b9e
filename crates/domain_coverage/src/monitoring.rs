//! Calculation monitoring
//!
//! The orchestrator reports every calculation (and every failure) to a
//! [`MonitoringSink`]. Recording is fire-and-forget: sinks never return
//! errors and never influence a calculation's outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};
use uuid::Uuid;

use core_kernel::{Money, PatientId, ServiceId};

use crate::error::ErrorCategory;

/// Which entry point produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationKind {
    Combined,
    Primary,
    Supplementary,
    Batch,
}

impl CalculationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalculationKind::Combined => "combined",
            CalculationKind::Primary => "primary",
            CalculationKind::Supplementary => "supplementary",
            CalculationKind::Batch => "batch",
        }
    }
}

/// One finished calculation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationEvent {
    pub id: Uuid,
    pub kind: CalculationKind,
    pub patient_id: PatientId,
    pub service_id: Option<ServiceId>,
    pub service_amount: Money,
    pub success: bool,
    pub duration_ms: u64,
    pub total_coverage: Option<Money>,
    pub final_patient_share: Option<Money>,
    pub recorded_at: DateTime<Utc>,
}

impl CalculationEvent {
    pub fn new(
        kind: CalculationKind,
        patient_id: PatientId,
        service_id: Option<ServiceId>,
        service_amount: Money,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            patient_id,
            service_id,
            service_amount,
            success: false,
            duration_ms: 0,
            total_coverage: None,
            final_patient_share: None,
            recorded_at,
        }
    }

    /// Marks the event successful with its headline figures
    pub fn succeeded(mut self, total_coverage: Money, final_patient_share: Money) -> Self {
        self.success = true;
        self.total_coverage = Some(total_coverage);
        self.final_patient_share = Some(final_patient_share);
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

/// One failed calculation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub id: Uuid,
    pub kind: CalculationKind,
    pub patient_id: PatientId,
    pub service_id: Option<ServiceId>,
    pub category: ErrorCategory,
    pub message: String,
    pub recorded_at: DateTime<Utc>,
}

impl ErrorEvent {
    pub fn new(
        kind: CalculationKind,
        patient_id: PatientId,
        service_id: Option<ServiceId>,
        category: ErrorCategory,
        message: impl Into<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            patient_id,
            service_id,
            category,
            message: message.into(),
            recorded_at,
        }
    }
}

/// Receives calculation and error events
pub trait MonitoringSink: Send + Sync {
    fn record_calculation(&self, event: CalculationEvent);

    fn record_error(&self, event: ErrorEvent);
}

/// Discards all events
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMonitor;

impl MonitoringSink for NoopMonitor {
    fn record_calculation(&self, _event: CalculationEvent) {}

    fn record_error(&self, _event: ErrorEvent) {}
}

/// Writes events to the tracing subscriber
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMonitor;

impl MonitoringSink for TracingMonitor {
    fn record_calculation(&self, event: CalculationEvent) {
        info!(
            event_id = %event.id,
            kind = event.kind.as_str(),
            patient_id = %event.patient_id,
            service_amount = %event.service_amount,
            success = event.success,
            duration_ms = event.duration_ms,
            "Coverage calculation recorded"
        );
    }

    fn record_error(&self, event: ErrorEvent) {
        warn!(
            event_id = %event.id,
            kind = event.kind.as_str(),
            patient_id = %event.patient_id,
            category = event.category.as_str(),
            message = %event.message,
            "Coverage calculation failed"
        );
    }
}

/// Aggregate view over the events held by an [`InMemoryMonitor`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitoringSummary {
    pub total_calculations: usize,
    pub successful_calculations: usize,
    pub failed_calculations: usize,
    pub average_duration_ms: u64,
    pub errors_by_category: BTreeMap<String, usize>,
    pub recent_errors: Vec<ErrorEvent>,
}

#[derive(Debug, Default)]
struct Buffers {
    calculations: VecDeque<CalculationEvent>,
    errors: VecDeque<ErrorEvent>,
}

/// Keeps the most recent events in bounded ring buffers
#[derive(Debug)]
pub struct InMemoryMonitor {
    capacity: usize,
    buffers: Mutex<Buffers>,
}

const RECENT_ERRORS_IN_SUMMARY: usize = 10;

impl InMemoryMonitor {
    /// Creates a monitor holding at most `capacity` events of each kind
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            buffers: Mutex::new(Buffers::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Buffers> {
        self.buffers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Most recent calculation events, newest last
    pub fn calculations(&self) -> Vec<CalculationEvent> {
        self.lock().calculations.iter().cloned().collect()
    }

    /// Most recent error events, newest last
    pub fn errors(&self) -> Vec<ErrorEvent> {
        self.lock().errors.iter().cloned().collect()
    }

    pub fn summary(&self) -> MonitoringSummary {
        let buffers = self.lock();
        let total = buffers.calculations.len();
        let successful = buffers.calculations.iter().filter(|e| e.success).count();
        let total_duration: u64 = buffers.calculations.iter().map(|e| e.duration_ms).sum();

        let mut errors_by_category = BTreeMap::new();
        for error in &buffers.errors {
            *errors_by_category
                .entry(error.category.as_str().to_string())
                .or_insert(0) += 1;
        }

        MonitoringSummary {
            total_calculations: total,
            successful_calculations: successful,
            failed_calculations: total - successful,
            average_duration_ms: if total == 0 { 0 } else { total_duration / total as u64 },
            errors_by_category,
            recent_errors: buffers
                .errors
                .iter()
                .rev()
                .take(RECENT_ERRORS_IN_SUMMARY)
                .cloned()
                .collect(),
        }
    }

    pub fn clear(&self) {
        let mut buffers = self.lock();
        buffers.calculations.clear();
        buffers.errors.clear();
    }
}

impl Default for InMemoryMonitor {
    fn default() -> Self {
        Self::new(1_000)
    }
}

impl MonitoringSink for InMemoryMonitor {
    fn record_calculation(&self, event: CalculationEvent) {
        let mut buffers = self.lock();
        if buffers.calculations.len() == self.capacity {
            buffers.calculations.pop_front();
        }
        buffers.calculations.push_back(event);
    }

    fn record_error(&self, event: ErrorEvent) {
        let mut buffers = self.lock();
        if buffers.errors.len() == self.capacity {
            buffers.errors.pop_front();
        }
        buffers.errors.push_back(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn event(success: bool, duration_ms: u64) -> CalculationEvent {
        let event = CalculationEvent::new(
            CalculationKind::Combined,
            PatientId::new(1),
            Some(ServiceId::new(2)),
            Money::new(dec!(100)),
            Utc::now(),
        )
        .with_duration_ms(duration_ms);
        if success {
            event.succeeded(Money::new(dec!(70)), Money::new(dec!(30)))
        } else {
            event
        }
    }

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let monitor = InMemoryMonitor::new(2);
        monitor.record_calculation(event(true, 1));
        monitor.record_calculation(event(true, 2));
        monitor.record_calculation(event(false, 3));

        let held = monitor.calculations();
        assert_eq!(held.len(), 2);
        assert_eq!(held[0].duration_ms, 2);
        assert_eq!(held[1].duration_ms, 3);
    }

    #[test]
    fn test_summary() {
        let monitor = InMemoryMonitor::new(10);
        monitor.record_calculation(event(true, 10));
        monitor.record_calculation(event(false, 20));
        monitor.record_error(ErrorEvent::new(
            CalculationKind::Combined,
            PatientId::new(1),
            None,
            ErrorCategory::NotFound,
            "active primary insurance not found",
            Utc::now(),
        ));

        let summary = monitor.summary();
        assert_eq!(summary.total_calculations, 2);
        assert_eq!(summary.successful_calculations, 1);
        assert_eq!(summary.failed_calculations, 1);
        assert_eq!(summary.average_duration_ms, 15);
        assert_eq!(summary.errors_by_category.get("not_found"), Some(&1));
        assert_eq!(summary.recent_errors.len(), 1);

        monitor.clear();
        assert_eq!(monitor.summary(), MonitoringSummary::default());
    }
}
