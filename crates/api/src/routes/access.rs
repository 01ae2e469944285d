//! Customer access to an occupied table by token and passcode.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use store::Store;

use super::AppState;
use super::catalog::ItemResponse;
use super::tables::TableResponse;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct AccessRequest {
    pub token: String,
    /// Six decimal digits, e.g. `"104271"`.
    pub passcode: String,
}

#[derive(Serialize)]
pub struct AccessResponse {
    pub establishment_id: String,
    pub table: TableResponse,
    /// The establishment's active menu.
    pub items: Vec<ItemResponse>,
}

fn parse_passcode(raw: &str) -> Result<u32, ApiError> {
    let raw = raw.trim();
    if raw.len() != 6 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ApiError::BadRequest("passcode must be 6 digits".to_string()));
    }
    raw.parse()
        .map_err(|_| ApiError::BadRequest("passcode must be 6 digits".to_string()))
}

/// POST /access
#[tracing::instrument(skip(state, req))]
pub async fn resolve<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<AccessRequest>,
) -> Result<Json<AccessResponse>, ApiError> {
    let table = state
        .workflow
        .tables()
        .resolve(req.token.trim(), parse_passcode(&req.passcode)?)
        .await?;
    let establishment_id = table.establishment_id();
    let items = state.catalog.list_items(establishment_id, None).await?;

    Ok(Json(AccessResponse {
        establishment_id: establishment_id.to_string(),
        table: table.into(),
        items: items.into_iter().map(ItemResponse::from).collect(),
    }))
}
