//! HTTP API over the ordering core.
//!
//! Routes are scoped by establishment id in the path. Responses render money
//! as decimal strings. Logging goes through tracing and metrics are exported
//! for Prometheus.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use metrics_exporter_prometheus::PrometheusHandle;
use ordering::RetryPolicy;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    use routes::{access, catalog, deliveries, establishments, ops, orders, sales, tables};

    let metrics_router = Router::new()
        .route("/metrics", get(ops::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(ops::health::<S>))
        .route("/access", post(access::resolve::<S>))
        .route("/establishments", post(establishments::create::<S>))
        .route(
            "/establishments/{establishment_id}",
            get(establishments::get::<S>).delete(establishments::archive::<S>),
        )
        .route(
            "/establishments/{establishment_id}/items",
            post(catalog::create::<S>).get(catalog::list::<S>),
        )
        .route(
            "/establishments/{establishment_id}/items/{item_id}",
            get(catalog::get::<S>)
                .patch(catalog::update::<S>)
                .delete(catalog::archive::<S>),
        )
        .route(
            "/establishments/{establishment_id}/items/{item_id}/stock",
            put(catalog::set_stock::<S>),
        )
        .route(
            "/establishments/{establishment_id}/orders",
            post(orders::place::<S>),
        )
        .route(
            "/establishments/{establishment_id}/sales",
            get(sales::list::<S>),
        )
        .route(
            "/establishments/{establishment_id}/sales/summary",
            get(sales::summary::<S>),
        )
        .route(
            "/establishments/{establishment_id}/sales/merge",
            post(sales::merge::<S>),
        )
        .route(
            "/establishments/{establishment_id}/sales/{sale_id}",
            get(sales::get::<S>),
        )
        .route(
            "/establishments/{establishment_id}/sales/{sale_id}/complete",
            post(sales::complete::<S>),
        )
        .route(
            "/establishments/{establishment_id}/tables",
            post(tables::create::<S>).get(tables::list::<S>),
        )
        .route(
            "/establishments/{establishment_id}/tables/{table_id}",
            get(tables::get::<S>)
                .patch(tables::rename::<S>)
                .delete(tables::archive::<S>),
        )
        .route(
            "/establishments/{establishment_id}/tables/{table_id}/availability",
            put(tables::set_availability::<S>),
        )
        .route(
            "/establishments/{establishment_id}/customers/{customer_id}/deliveries",
            get(deliveries::list::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over `store`.
pub fn create_state<S: Store + Clone + 'static>(store: S, retry: RetryPolicy) -> Arc<AppState<S>> {
    Arc::new(AppState::new(store, retry))
}
