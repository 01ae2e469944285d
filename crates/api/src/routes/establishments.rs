//! Establishment endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::EstablishmentId;
use domain::Establishment;
use serde::{Deserialize, Serialize};
use store::Store;

use super::{AppState, parse_id};
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct CreateEstablishmentRequest {
    pub name: String,
    pub address: String,
}

#[derive(Serialize)]
pub struct EstablishmentResponse {
    pub id: String,
    pub name: String,
    pub address: String,
    pub created_at: String,
}

impl From<Establishment> for EstablishmentResponse {
    fn from(establishment: Establishment) -> Self {
        Self {
            id: establishment.id.to_string(),
            name: establishment.name,
            address: establishment.address,
            created_at: establishment.created_at.to_rfc3339(),
        }
    }
}

/// POST /establishments
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateEstablishmentRequest>,
) -> Result<(StatusCode, Json<EstablishmentResponse>), ApiError> {
    let establishment = state
        .establishments
        .create(&req.name, &req.address)
        .await?;
    Ok((StatusCode::CREATED, Json(establishment.into())))
}

/// GET /establishments/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<EstablishmentResponse>, ApiError> {
    let establishment_id: EstablishmentId = parse_id("establishment", &id)?;
    let establishment = state.establishments.get(establishment_id).await?;
    Ok(Json(establishment.into()))
}

/// DELETE /establishments/{id}
#[tracing::instrument(skip(state))]
pub async fn archive<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let establishment_id: EstablishmentId = parse_id("establishment", &id)?;
    state.establishments.archive(establishment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
