//! Memoisation of supplementary calculations
//!
//! Entries expire after a fixed time-to-live and the cache never holds more
//! than its capacity; when full, expired entries are purged first and then
//! the oldest entry is evicted.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use core_kernel::{Money, PatientId, ServiceId};

use crate::results::SupplementaryCalculationResult;

/// Inputs that fully determine a supplementary calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SupplementaryCacheKey {
    pub patient_id: PatientId,
    pub service_id: ServiceId,
    pub service_amount: Money,
    pub primary_coverage: Money,
    pub calculation_date: NaiveDate,
}

/// Cache of supplementary results
pub trait CoverageCache: Send + Sync {
    fn get(&self, key: &SupplementaryCacheKey) -> Option<SupplementaryCalculationResult>;

    fn insert(&self, key: SupplementaryCacheKey, value: SupplementaryCalculationResult);

    fn clear(&self);
}

struct Entry {
    value: SupplementaryCalculationResult,
    inserted_at: Instant,
    sequence: u64,
}

#[derive(Default)]
struct State {
    entries: HashMap<SupplementaryCacheKey, Entry>,
    next_sequence: u64,
}

/// In-process cache with TTL and capacity bounds
pub struct TtlCache {
    ttl: Duration,
    capacity: usize,
    state: Mutex<State>,
}

impl TtlCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of entries currently held, expired ones included
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CoverageCache for TtlCache {
    fn get(&self, key: &SupplementaryCacheKey) -> Option<SupplementaryCalculationResult> {
        let mut state = self.lock();
        let expired = match state.entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                return Some(entry.value.clone())
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            state.entries.remove(key);
        }
        None
    }

    fn insert(&self, key: SupplementaryCacheKey, value: SupplementaryCalculationResult) {
        let mut state = self.lock();
        if state.entries.len() >= self.capacity && !state.entries.contains_key(&key) {
            let ttl = self.ttl;
            state.entries.retain(|_, entry| entry.inserted_at.elapsed() < ttl);

            if state.entries.len() >= self.capacity {
                let oldest = state
                    .entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.sequence)
                    .map(|(key, _)| *key);
                if let Some(oldest) = oldest {
                    state.entries.remove(&oldest);
                }
            }
        }
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
                sequence,
            },
        );
    }

    fn clear(&self) {
        self.lock().entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn key(patient: i64) -> SupplementaryCacheKey {
        SupplementaryCacheKey {
            patient_id: PatientId::new(patient),
            service_id: ServiceId::new(1),
            service_amount: Money::new(dec!(100)),
            primary_coverage: Money::new(dec!(70)),
            calculation_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        }
    }

    fn value() -> SupplementaryCalculationResult {
        SupplementaryCalculationResult {
            service_amount: Money::new(dec!(100)),
            primary_coverage: Money::new(dec!(70)),
            supplementary_coverage: Money::new(dec!(27)),
            final_patient_share: Money::new(dec!(3)),
            total_coverage: Money::new(dec!(97)),
            calculation_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            is_fully_covered: false,
        }
    }

    #[test]
    fn test_hit_and_miss() {
        let cache = TtlCache::new(Duration::from_secs(60), 10);
        assert!(cache.get(&key(1)).is_none());
        cache.insert(key(1), value());
        assert_eq!(cache.get(&key(1)), Some(value()));
        assert!(cache.get(&key(2)).is_none());
    }

    #[test]
    fn test_expired_entries_are_dropped() {
        let cache = TtlCache::new(Duration::ZERO, 10);
        cache.insert(key(1), value());
        assert!(cache.get(&key(1)).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let cache = TtlCache::new(Duration::from_secs(60), 2);
        cache.insert(key(1), value());
        cache.insert(key(2), value());
        cache.insert(key(3), value());

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key(1)).is_none());
        assert!(cache.get(&key(3)).is_some());
    }
}
