//! Tests for core_kernel configuration errors

use core_kernel::error::ConfigError;

#[test]
fn test_negative_value_message() {
    let error = ConfigError::negative("share_tolerance", "-0.01");

    assert_eq!(error.field(), "share_tolerance");
    assert_eq!(error.to_string(), "share_tolerance must not be negative, got -0.01");
}

#[test]
fn test_zero_value_message() {
    let error = ConfigError::zero("cache_capacity");

    assert_eq!(error, ConfigError::Zero { field: "cache_capacity" });
    assert_eq!(error.to_string(), "cache_capacity must be at least 1");
}

#[test]
fn test_boxes_as_std_error() {
    let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(ConfigError::zero("monitor_capacity"));
    assert!(boxed.to_string().contains("monitor_capacity"));
}
