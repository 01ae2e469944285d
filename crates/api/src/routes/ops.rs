//! Operational endpoints: health and Prometheus metrics.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use common::EstablishmentId;
use metrics_exporter_prometheus::PrometheusHandle;
use ordering::OrderingError;
use serde::Serialize;
use store::Store;

use super::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub storage: &'static str,
}

/// GET /health
///
/// Probes the store with a lookup that cannot match; anything but a storage
/// failure means it answered.
pub async fn health<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> (StatusCode, Json<HealthResponse>) {
    match state.establishments.get(EstablishmentId::new()).await {
        Err(OrderingError::StorageUnavailable(detail)) => {
            tracing::warn!(error = %detail, "health probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded",
                    storage: "unavailable",
                }),
            )
        }
        _ => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                storage: "ok",
            }),
        ),
    }
}

/// GET /metrics
pub async fn metrics(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        handle.render(),
    )
}
