//! Storefront API Library
//!
//! Catalog, carts, address book and the order workflow with hosted-checkout payments
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;
pub mod webhooks;

use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, limit::RequestBodyLimitLayer};

use crate::auth::{AuthConfig, AuthService};
use crate::services::payment_gateway::PaymentGateway;
use crate::webhooks::SignatureVerifier;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<db::DbPool>,
    pub config: config::AppConfig,
    pub auth: Arc<AuthService>,
    pub webhook_verifier: SignatureVerifier,
    pub services: handlers::AppServices,
}

impl AppState {
    /// Wires the services over one pool and one payment gateway
    pub fn new(
        db: Arc<db::DbPool>,
        config: config::AppConfig,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let auth = Arc::new(AuthService::new(AuthConfig::from(&config)));
        let webhook_verifier = SignatureVerifier::new(
            config.payment_webhook_secret.clone(),
            config.payment_webhook_tolerance_secs,
        );
        let services = handlers::AppServices::new(db.clone(), gateway, auth.clone(), &config);

        Self {
            db,
            config,
            auth,
            webhook_verifier,
            services,
        }
    }
}

// The auth extractors only need the token service
impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

/// Routes mounted under `/api`
pub fn api_routes() -> Router<AppState> {
    let users = Router::new()
        .route("/register", post(handlers::users::register))
        .route("/login", post(handlers::users::login))
        .route("/auth", get(handlers::users::current_user))
        .route("/logout", get(handlers::users::logout));

    let seller = Router::new()
        .route("/login", post(handlers::seller::seller_login))
        .route("/auth", get(handlers::seller::seller_auth))
        .route("/logout", get(handlers::seller::seller_logout));

    let products = Router::new()
        .route("/add", post(handlers::products::add_product))
        .route("/list", get(handlers::products::list_products))
        .route("/id", post(handlers::products::product_by_id))
        .route("/stock", post(handlers::products::change_stock));

    let cart = Router::new().route("/update", post(handlers::cart::update_cart));

    let addresses = Router::new()
        .route("/add", post(handlers::addresses::add_address))
        .route("/get", get(handlers::addresses::list_addresses));

    // The webhook is unauthenticated but signature-verified
    let orders = Router::new()
        .route("/cod", post(handlers::orders::place_cod_order))
        .route("/stripe", post(handlers::orders::place_online_order))
        .route("/user", get(handlers::orders::user_orders))
        .route("/seller", get(handlers::orders::seller_orders))
        .route("/webhook", post(handlers::payment_webhooks::payment_webhook));

    Router::new()
        .nest("/user", users)
        .nest("/seller", seller)
        .nest("/product", products)
        .nest("/cart", cart)
        .nest("/address", addresses)
        .nest("/order", orders)
}

/// Full application: banner, health, API, OpenAPI document and the shared layers.
/// CORS is left to the binary since it depends on deployment settings.
pub fn app_router(state: AppState) -> Router {
    let max_body_size = state.config.max_body_size;

    Router::new()
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::health_check))
        .nest("/api", api_routes())
        .merge(openapi::openapi_routes())
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(CompressionLayer::new())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}
