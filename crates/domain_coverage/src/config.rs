//! Engine configuration

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use core_kernel::ConfigError;

/// How condition keys the engine does not recognise are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownConditionPolicy {
    /// Unknown conditions are satisfied (and logged)
    #[default]
    Permissive,
    /// Unknown conditions are never satisfied
    Reject,
}

/// What the combined calculation does when the supplementary plan has no
/// tariff for the service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingSupplementaryTariff {
    /// The patient pays everything primary insurance does not cover
    #[default]
    PatientLiable,
    /// The calculation fails with a not-found error
    Abort,
}

/// Coverage engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub unknown_condition_policy: UnknownConditionPolicy,
    /// Days a calculation date may lie after today
    pub future_date_tolerance_days: i64,
    /// Allowed |patient + insurer - price| for tariffs
    pub share_tolerance: Decimal,
    pub missing_supplementary_tariff: MissingSupplementaryTariff,
    pub cache_ttl_secs: u64,
    pub cache_capacity: usize,
    pub monitor_capacity: usize,
    /// Run the result property checks after each calculation
    pub validate_results: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            unknown_condition_policy: UnknownConditionPolicy::Permissive,
            future_date_tolerance_days: 1,
            share_tolerance: dec!(0.01),
            missing_supplementary_tariff: MissingSupplementaryTariff::PatientLiable,
            cache_ttl_secs: 300,
            cache_capacity: 10_000,
            monitor_capacity: 1_000,
            validate_results: true,
        }
    }
}

impl EngineConfig {
    /// Cache entry lifetime
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Checks that the values are usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.future_date_tolerance_days < 0 {
            return Err(ConfigError::negative(
                "future_date_tolerance_days",
                self.future_date_tolerance_days,
            ));
        }
        if self.share_tolerance < Decimal::ZERO {
            return Err(ConfigError::negative("share_tolerance", self.share_tolerance));
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::zero("cache_capacity"));
        }
        if self.monitor_capacity == 0 {
            return Err(ConfigError::zero("monitor_capacity"));
        }
        Ok(())
    }
}
