//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{accounts, conversions, credits, health, styles};
use crate::state::AppState;

/// Maximum concurrent conversion uploads.
/// Each one holds an image in memory and waits on the transformation service.
const CONVERSION_MAX_CONCURRENT_REQUESTS: usize = 16;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
/// - `GET /v1/styles` - Active style presets
/// - `GET /v1/styles/:style_id` - One style preset
/// - `GET /v1/credits/packages` - Credit packages
///
/// ## Accounts (JWT auth)
/// - `POST /v1/accounts` - Register with trial credits
/// - `GET /v1/accounts/me` - Get current user's account
///
/// ## Credits (JWT auth)
/// - `GET /v1/credits/balance` - Get current balance
/// - `GET /v1/credits/transactions` - List transaction history
///
/// ## Credits (admin key)
/// - `POST /v1/credits/grant` - Fulfil a package or add bonus credits
///
/// ## Conversions (JWT auth)
/// - `POST /v1/conversions?style_id=` - Convert the uploaded image
/// - `GET /v1/conversions` - List own conversions
/// - `GET /v1/conversions/:conversion_id` - Get one conversion
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let conversion_routes = Router::new()
        .route(
            "/",
            post(conversions::create_conversion).get(conversions::list_conversions),
        )
        .route("/:conversion_id", get(conversions::get_conversion))
        .layer(ConcurrencyLimitLayer::new(CONVERSION_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        // Accounts
        .route("/accounts", post(accounts::create_account))
        .route("/accounts/me", get(accounts::get_account))
        // Credits
        .route("/credits/balance", get(credits::get_balance))
        .route("/credits/transactions", get(credits::list_transactions))
        .route("/credits/packages", get(credits::list_packages))
        .route("/credits/grant", post(credits::grant_credits))
        // Styles
        .route("/styles", get(styles::list_styles))
        .route("/styles/:style_id", get(styles::get_style))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS))
        // Conversions (with their own concurrency limit)
        .nest("/conversions", conversion_routes);

    Router::new()
        .route("/health", get(health::health))
        .nest("/v1", api_routes)
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
