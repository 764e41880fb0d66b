//! HTTP storefront API.
//!
//! Exposes accounts, catalog, cart, checkout and order endpoints under
//! `/api/v1`, with structured logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post, put};
use checkout::{CheckoutService, OrderStatusService, RetryPolicy};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use auth::TokenKeys;
use config::Config;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub store: S,
    pub checkout: CheckoutService<S>,
    pub statuses: OrderStatusService<S>,
    pub tokens: TokenKeys,
}

impl<S: Store + Clone> AppState<S> {
    /// Wires the services over `store` using the deadline, retry and token
    /// settings from `config`.
    pub fn new(store: S, config: &Config) -> Self {
        let retry = RetryPolicy {
            max_attempts: config.checkout_max_attempts.max(1),
            ..RetryPolicy::default()
        };
        Self {
            checkout: CheckoutService::new(store.clone())
                .with_deadline(config.checkout_timeout)
                .with_retry_policy(retry),
            statuses: OrderStatusService::new(store.clone()),
            tokens: TokenKeys::new(&config.jwt_secret, config.token_ttl),
            store,
        }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::ops::metrics))
        .with_state(metrics_handle);

    let api = Router::new()
        .route("/users/register", post(routes::users::register::<S>))
        .route("/users/login", post(routes::users::login::<S>))
        .route(
            "/products",
            get(routes::products::list::<S>).post(routes::products::create::<S>),
        )
        .route(
            "/products/{id}",
            get(routes::products::get::<S>)
                .put(routes::products::update::<S>)
                .delete(routes::products::delete::<S>),
        )
        .route(
            "/cart",
            get(routes::cart::get::<S>).post(routes::cart::add::<S>),
        )
        .route("/cart/{product_id}", delete(routes::cart::remove::<S>))
        .route("/checkout", post(routes::orders::checkout::<S>))
        .route("/orders", get(routes::orders::history::<S>))
        .route(
            "/orders/{id}/status",
            put(routes::orders::update_status::<S>),
        )
        .with_state(state);

    Router::new()
        .route("/health", get(routes::ops::health))
        .nest("/api/v1", api)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
