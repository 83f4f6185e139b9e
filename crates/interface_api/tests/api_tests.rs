//! HTTP API Tests
//!
//! Drives the Axum router in-process with `tower::ServiceExt::oneshot`
//! over the standard fixture catalog.
//!
//! # Test Organization
//!
//! - `health` - Health endpoint
//! - `calculations` - Combined, primary, supplementary and batch routes
//! - `errors` - Status codes and failure envelopes
//! - `rules_and_tariffs` - Rule evaluation and tariff validation routes
//! - `monitoring` - Summary route

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use domain_coverage::{EngineConfig, InMemoryCoverageStore};
use interface_api::{create_router, AppState};
use std::sync::Arc;
use test_utils::{StoreFixtures, TemporalFixtures, TestRuleBuilder};

// ============================================================================
// TEST FIXTURES
// ============================================================================

fn app_over(store: Arc<InMemoryCoverageStore>) -> Router {
    create_router(AppState::with_clock(
        store,
        EngineConfig::default(),
        TemporalFixtures::clock(),
    ))
}

async fn app() -> Router {
    app_over(StoreFixtures::standard().await)
}

async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(body) => Body::from(body.to_string()),
            None => Body::empty(),
        })
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn post(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, "POST", uri, Some(body)).await
}

fn amount(value: &Value) -> f64 {
    match value {
        Value::String(s) => s.parse().unwrap(),
        Value::Number(n) => n.as_f64().unwrap(),
        other => panic!("Expected an amount, got {}", other),
    }
}

// ============================================================================
// Health
// ============================================================================

mod health {
    use super::*;

    #[tokio::test]
    async fn test_healthy_store() {
        let (status, body) = send(app().await, "GET", "/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["store"]["adapter_id"], "in-memory-coverage-store");
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let store = StoreFixtures::standard().await;
        store.set_unavailable(true);

        let (status, body) = send(app_over(store), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "unhealthy");
    }
}

// ============================================================================
// Calculations
// ============================================================================

mod calculations {
    use super::*;

    #[tokio::test]
    async fn test_combined() {
        let (status, body) = post(
            app().await,
            "/api/v1/calculations",
            json!({ "patient_id": 1, "service_id": 10, "service_amount": "1000000" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(amount(&body["data"]["total_coverage"]), 970000.0);
        assert_eq!(amount(&body["data"]["final_patient_share"]), 30000.0);
        assert_eq!(body["data"]["breakdown"], "Primary: 70.0%, Supplementary: 90.0%");
        assert_eq!(body["data"]["calculation_date"], "2024-06-01");
        assert!(body.get("error_category").is_none());
    }

    #[tokio::test]
    async fn test_primary() {
        let (status, body) = post(
            app().await,
            "/api/v1/calculations/primary",
            json!({
                "patient_id": 2,
                "service_id": 10,
                "service_amount": "1000000",
                "calculation_date": "2024-05-15"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(amount(&body["data"]["insurance_coverage"]), 700000.0);
        assert_eq!(amount(&body["data"]["patient_payment"]), 300000.0);
    }

    #[tokio::test]
    async fn test_supplementary() {
        let (status, body) = post(
            app().await,
            "/api/v1/calculations/supplementary",
            json!({
                "patient_id": 1,
                "service_id": 11,
                "service_amount": "1000000",
                "primary_coverage": "700000"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(amount(&body["data"]["supplementary_coverage"]), 100000.0);
        assert_eq!(amount(&body["data"]["final_patient_share"]), 200000.0);
    }

    #[tokio::test]
    async fn test_batch_skips_failing_line() {
        let (status, body) = post(
            app().await,
            "/api/v1/calculations/batch",
            json!({
                "patient_id": 1,
                "lines": [
                    { "service_id": 10, "service_amount": "1000000" },
                    { "service_id": 12, "service_amount": "1000000" },
                    { "service_id": 11, "service_amount": "1000000" }
                ]
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
    }
}

// ============================================================================
// Errors
// ============================================================================

mod errors {
    use super::*;

    #[tokio::test]
    async fn test_no_primary_insurance_is_not_found() {
        let (status, body) = post(
            app().await,
            "/api/v1/calculations",
            json!({ "patient_id": 3, "service_id": 10, "service_amount": "1000000" }),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["error_category"], "not_found");
        assert_eq!(body["message"], "active primary insurance not found");
        assert!(body.get("data").is_none());
    }

    #[tokio::test]
    async fn test_shape_errors_are_unprocessable() {
        let (status, body) = post(
            app().await,
            "/api/v1/calculations",
            json!({ "patient_id": 0, "service_id": 10, "service_amount": "0" }),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error_category"], "validation");
    }

    #[tokio::test]
    async fn test_empty_batch_is_unprocessable() {
        let (status, _) = post(
            app().await,
            "/api/v1/calculations/batch",
            json!({ "patient_id": 1, "lines": [] }),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let (status, body) = post(app().await, "/api/v1/calculations", json!({ "patient_id": "x" })).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_store_outage_is_internal_error() {
        let store = StoreFixtures::standard().await;
        store.set_unavailable(true);

        let (status, body) = post(
            app_over(store),
            "/api/v1/calculations",
            json!({ "patient_id": 1, "service_id": 10, "service_amount": "1000000" }),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error_category"], "system");
        assert_eq!(body["message"], "error calculating combined insurance");
    }

    #[tokio::test]
    async fn test_amount_at_decimal_limit_is_internal_error() {
        let (status, body) = post(
            app().await,
            "/api/v1/calculations",
            json!({
                "patient_id": 2,
                "service_id": 10,
                "service_amount": "79228162514264337593543950335"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["error_category"], "system");
    }

    #[tokio::test]
    async fn test_future_date_is_unprocessable() {
        let (status, _) = post(
            app().await,
            "/api/v1/calculations",
            json!({
                "patient_id": 1,
                "service_id": 10,
                "service_amount": "1000000",
                "calculation_date": "2024-07-01"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}

// ============================================================================
// Rules and tariffs
// ============================================================================

mod rules_and_tariffs {
    use super::*;
    use domain_coverage::RuleType;
    use test_utils::TestTariffBuilder;

    #[tokio::test]
    async fn test_rule_evaluation() {
        let store = StoreFixtures::standard().await;
        store
            .add_rule_definition(
                TestRuleBuilder::new(8, RuleType::Deductible)
                    .condition("service_amount", json!({ "min": 500000 }))
                    .action("set_deductible", json!(50000))
                    .build(),
            )
            .await
            .unwrap();

        let (status, body) = post(
            app_over(store),
            "/api/v1/rules/evaluate",
            json!({
                "patient_id": 1,
                "service_id": 10,
                "service_amount": "1000000",
                "rule_type": "deductible"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["matched_rule"], 8);
        assert_eq!(amount(&body["data"]["effect"]["deductible"]), 50000.0);
    }

    #[tokio::test]
    async fn test_tariff_validation_reports_duplicates() {
        let tariff = TestTariffBuilder::new().with_id(100).build();

        let (status, body) = post(
            app().await,
            "/api/v1/tariffs/validate",
            serde_json::to_value(&tariff).unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["is_valid"], false);
    }

    #[tokio::test]
    async fn test_tariff_with_extreme_shares_is_reported() {
        let mut tariff = serde_json::to_value(TestTariffBuilder::new().with_id(300).build()).unwrap();
        tariff["patient_share"] = json!("79228162514264337593543950335");
        tariff["insurer_share"] = json!("79228162514264337593543950335");

        let (status, body) = post(app().await, "/api/v1/tariffs/validate", tariff).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["is_valid"], false);
        let errors = body["data"]["errors"].as_array().unwrap();
        assert!(errors.iter().any(|e| e.as_str().unwrap().contains("overflows")));
    }
}

// ============================================================================
// Monitoring
// ============================================================================

mod monitoring {
    use super::*;

    #[tokio::test]
    async fn test_summary_counts_calculations() {
        let state = AppState::with_clock(
            StoreFixtures::standard().await,
            EngineConfig::default(),
            TemporalFixtures::clock(),
        );
        let router = create_router(state.clone());

        post(
            router.clone(),
            "/api/v1/calculations",
            json!({ "patient_id": 1, "service_id": 10, "service_amount": "1000000" }),
        )
        .await;
        post(
            router.clone(),
            "/api/v1/calculations",
            json!({ "patient_id": 3, "service_id": 10, "service_amount": "1000000" }),
        )
        .await;

        let (status, body) = send(router, "GET", "/api/v1/monitoring/summary", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["total_calculations"], 2);
        assert_eq!(body["data"]["failed_calculations"], 1);
        assert_eq!(state.monitor.summary().successful_calculations, 1);
    }
}
