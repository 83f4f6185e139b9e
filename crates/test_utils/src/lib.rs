//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! coverage engine test suites.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built plans, tariffs, policies and a seeded store
//! - `builders`: Builder patterns for plans, tariffs and rule definitions
//! - `assertions`: Custom assertion helpers for money and results
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use assertions::*;
pub use generators::*;
