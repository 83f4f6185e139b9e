//! Request handlers

pub mod calculation;
pub mod health;
pub mod monitoring;
pub mod rules;
