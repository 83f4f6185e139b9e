//! Adapters for the coverage ports
//!
//! - **InMemoryCoverageStore**: implements every coverage port over
//!   in-process collections, seeded from a [`CatalogSnapshot`]

pub mod memory;

pub use memory::{CatalogSnapshot, InMemoryCoverageStore};
