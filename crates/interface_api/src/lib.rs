//! HTTP API Layer
//!
//! This crate exposes the coverage calculation engine over REST using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: Calculation, rule evaluation, tariff validation, monitoring
//! - **Middleware**: Request tracing and logging
//! - **DTOs**: Request bodies, shape-checked with `validator`
//! - **Error Handling**: Failures rendered as `CalculationOutcome` envelopes
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let state = AppState::new(store, config.engine.clone());
//! let app = create_router(state);
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use core_kernel::{Clock, SystemClock};
use domain_coverage::{
    CombinedCoverageService, EngineConfig, InMemoryCoverageStore, InMemoryMonitor, TtlCache,
};

use crate::handlers::{calculation, health, monitoring, rules};
use crate::middleware::request_logging;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<CombinedCoverageService>,
    pub monitor: Arc<InMemoryMonitor>,
    pub store: Arc<InMemoryCoverageStore>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Wires the engine over a store using the system clock
    pub fn new(store: Arc<InMemoryCoverageStore>, config: EngineConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Wires the engine over a store with an explicit clock
    pub fn with_clock(
        store: Arc<InMemoryCoverageStore>,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let monitor = Arc::new(InMemoryMonitor::new(config.monitor_capacity));
        let cache = Arc::new(TtlCache::new(config.cache_ttl(), config.cache_capacity));
        let service = CombinedCoverageService::new(store.clone(), store.clone(), store.clone(), config)
            .with_monitor(monitor.clone())
            .with_cache(cache)
            .with_clock(clock.clone());

        Self {
            service: Arc::new(service),
            monitor,
            store,
            clock,
        }
    }
}

/// Creates the main API router
pub fn create_router(state: AppState) -> Router {
    let calculation_routes = Router::new()
        .route("/", post(calculation::calculate_combined))
        .route("/primary", post(calculation::calculate_primary))
        .route("/supplementary", post(calculation::calculate_supplementary))
        .route("/batch", post(calculation::calculate_batch));

    let api_routes = Router::new()
        .nest("/calculations", calculation_routes)
        .route("/rules/evaluate", post(rules::evaluate_rules))
        .route("/tariffs/validate", post(rules::validate_tariff))
        .route("/monitoring/summary", get(monitoring::summary))
        .layer(axum_middleware::from_fn(request_logging));

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
