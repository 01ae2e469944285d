//! Table endpoints: staff CRUD and the availability transition.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{EstablishmentId, TableId};
use domain::{Availability, Table};
use ordering::TableTransition;
use serde::{Deserialize, Serialize};
use store::Store;

use super::sales::SaleResponse;
use super::{AppState, parse_id};
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct TableNameRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct AvailabilityRequest {
    pub availability: Availability,
}

// -- Response types --

#[derive(Serialize)]
pub struct TableResponse {
    pub id: String,
    pub name: String,
    pub availability: Availability,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passcode: Option<String>,
    pub open_sales: Vec<String>,
    pub running_total: String,
    pub version: i64,
    pub created_at: String,
}

impl From<Table> for TableResponse {
    fn from(table: Table) -> Self {
        let credential = table.credential();
        Self {
            id: table.id().to_string(),
            name: table.name().to_string(),
            availability: table.availability(),
            token: credential.map(|c| c.token().to_string()),
            passcode: credential.map(|c| format!("{:06}", c.passcode())),
            open_sales: table.open_sales().iter().map(|id| id.to_string()).collect(),
            running_total: table.running_total().to_decimal_string(),
            version: table.version().as_i64(),
            created_at: table.created_at().to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct TransitionResponse {
    pub table: TableResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settled_sale: Option<SaleResponse>,
}

impl From<TableTransition> for TransitionResponse {
    fn from(transition: TableTransition) -> Self {
        Self {
            table: transition.table.into(),
            settled_sale: transition.settled.map(SaleResponse::from),
        }
    }
}

fn ids(raw: &(String, String)) -> Result<(EstablishmentId, TableId), ApiError> {
    Ok((parse_id("establishment", &raw.0)?, parse_id("table", &raw.1)?))
}

// -- Handlers --

/// POST /establishments/{establishment_id}/tables
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(establishment_id): Path<String>,
    Json(req): Json<TableNameRequest>,
) -> Result<(StatusCode, Json<TableResponse>), ApiError> {
    let establishment_id: EstablishmentId = parse_id("establishment", &establishment_id)?;
    state.establishments.get(establishment_id).await?;
    let table = state
        .workflow
        .tables()
        .create(establishment_id, &req.name)
        .await?;
    Ok((StatusCode::CREATED, Json(table.into())))
}

/// GET /establishments/{establishment_id}/tables
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(establishment_id): Path<String>,
) -> Result<Json<Vec<TableResponse>>, ApiError> {
    let establishment_id: EstablishmentId = parse_id("establishment", &establishment_id)?;
    state.establishments.get(establishment_id).await?;
    let tables = state.workflow.tables().list(establishment_id).await?;
    Ok(Json(tables.into_iter().map(TableResponse::from).collect()))
}

/// GET /establishments/{establishment_id}/tables/{table_id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(path): Path<(String, String)>,
) -> Result<Json<TableResponse>, ApiError> {
    let (establishment_id, table_id) = ids(&path)?;
    let table = state
        .workflow
        .tables()
        .get(establishment_id, table_id)
        .await?;
    Ok(Json(table.into()))
}

/// PATCH /establishments/{establishment_id}/tables/{table_id}
#[tracing::instrument(skip(state, req))]
pub async fn rename<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(path): Path<(String, String)>,
    Json(req): Json<TableNameRequest>,
) -> Result<Json<TableResponse>, ApiError> {
    let (establishment_id, table_id) = ids(&path)?;
    let table = state
        .workflow
        .tables()
        .rename(establishment_id, table_id, &req.name)
        .await?;
    Ok(Json(table.into()))
}

/// DELETE /establishments/{establishment_id}/tables/{table_id}
#[tracing::instrument(skip(state))]
pub async fn archive<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(path): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let (establishment_id, table_id) = ids(&path)?;
    state
        .workflow
        .tables()
        .archive(establishment_id, table_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /establishments/{establishment_id}/tables/{table_id}/availability
///
/// Moving a table to `AVAILABLE` settles its tab.
#[tracing::instrument(skip(state, req))]
pub async fn set_availability<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(path): Path<(String, String)>,
    Json(req): Json<AvailabilityRequest>,
) -> Result<Json<TransitionResponse>, ApiError> {
    let (establishment_id, table_id) = ids(&path)?;
    let transition = state
        .workflow
        .tables()
        .transition(establishment_id, table_id, req.availability)
        .await?;
    Ok(Json(transition.into()))
}
