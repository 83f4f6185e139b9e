//! Core Kernel - Foundational types and utilities for the coverage engine
//!
//! This crate provides the fundamental building blocks used by the domain:
//! - Money and percentage types with precise decimal arithmetic
//! - Validity windows and an injectable clock
//! - Strongly-typed integer identifiers
//! - Port infrastructure for hexagonal adapters

pub mod money;
pub mod temporal;
pub mod identifiers;
pub mod error;
pub mod ports;

pub use money::{Money, MoneyError, Percentage, MONEY_DECIMAL_PLACES};
pub use temporal::{Clock, FixedClock, SystemClock, TemporalError, ValidityWindow};
pub use identifiers::{
    PatientId, PatientInsuranceId, PlanId, RuleId, ServiceCategoryId, ServiceId, TariffId,
};
pub use error::ConfigError;
pub use ports::{AdapterHealth, DomainPort, HealthCheckResult, HealthCheckable, PortError};
