//! Catalog endpoints, including staff restocks.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{EstablishmentId, ItemId};
use domain::{CatalogItem, ItemKind, Stock, UnitPrice};
use ordering::{NewItem, OrderingError, ValidationError};
use serde::{Deserialize, Serialize};
use store::{ItemDetails, Store};

use super::{AppState, parse_id};
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateItemRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Decimal string, e.g. `"12.50"`.
    pub price: String,
    pub kind: ItemKind,
    pub quantity: Option<u32>,
}

#[derive(Deserialize)]
pub struct UpdateItemRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
}

#[derive(Deserialize)]
pub struct SetStockRequest {
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct ListItemsQuery {
    pub kind: Option<ItemKind>,
}

// -- Response types --

#[derive(Serialize)]
pub struct ItemResponse {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    pub created_at: String,
}

impl From<CatalogItem> for ItemResponse {
    fn from(item: CatalogItem) -> Self {
        Self {
            id: item.id.to_string(),
            kind: item.kind().as_str(),
            quantity: item.stock.quantity(),
            price: item.price.to_decimal_string(),
            name: item.name,
            description: item.description,
            created_at: item.created_at.to_rfc3339(),
        }
    }
}

fn parse_price(raw: &str) -> Result<UnitPrice, ApiError> {
    UnitPrice::parse(raw).map_err(|e| ApiError::from(OrderingError::from(ValidationError::from(e))))
}

fn ids(raw: &(String, String)) -> Result<(EstablishmentId, ItemId), ApiError> {
    Ok((parse_id("establishment", &raw.0)?, parse_id("item", &raw.1)?))
}

// -- Handlers --

/// POST /establishments/{establishment_id}/items
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(establishment_id): Path<String>,
    Json(req): Json<CreateItemRequest>,
) -> Result<(StatusCode, Json<ItemResponse>), ApiError> {
    let establishment_id: EstablishmentId = parse_id("establishment", &establishment_id)?;
    let stock = match (req.kind, req.quantity) {
        (ItemKind::Stocked, Some(quantity)) => Stock::Counted(quantity),
        (ItemKind::Stocked, None) => {
            return Err(ApiError::BadRequest(
                "quantity is required for stocked items".to_string(),
            ));
        }
        (ItemKind::Unlimited, None) => Stock::Unlimited,
        (ItemKind::Unlimited, Some(_)) => {
            return Err(ApiError::BadRequest(
                "unlimited items do not take a quantity".to_string(),
            ));
        }
    };

    let item = state
        .catalog
        .create_item(
            establishment_id,
            NewItem {
                name: req.name,
                description: req.description,
                price: parse_price(&req.price)?,
                stock,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(item.into())))
}

/// GET /establishments/{establishment_id}/items
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(establishment_id): Path<String>,
    Query(query): Query<ListItemsQuery>,
) -> Result<Json<Vec<ItemResponse>>, ApiError> {
    let establishment_id: EstablishmentId = parse_id("establishment", &establishment_id)?;
    state.establishments.get(establishment_id).await?;
    let items = state.catalog.list_items(establishment_id, query.kind).await?;
    Ok(Json(items.into_iter().map(ItemResponse::from).collect()))
}

/// GET /establishments/{establishment_id}/items/{item_id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(path): Path<(String, String)>,
) -> Result<Json<ItemResponse>, ApiError> {
    let (establishment_id, item_id) = ids(&path)?;
    let item = state.catalog.get_item(establishment_id, item_id).await?;
    Ok(Json(item.into()))
}

/// PATCH /establishments/{establishment_id}/items/{item_id}
#[tracing::instrument(skip(state, req))]
pub async fn update<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(path): Path<(String, String)>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<ItemResponse>, ApiError> {
    let (establishment_id, item_id) = ids(&path)?;
    let details = ItemDetails {
        name: req.name,
        description: req.description,
        price: req.price.as_deref().map(parse_price).transpose()?,
    };
    let item = state
        .catalog
        .update_item(establishment_id, item_id, details)
        .await?;
    Ok(Json(item.into()))
}

/// PUT /establishments/{establishment_id}/items/{item_id}/stock
#[tracing::instrument(skip(state, req))]
pub async fn set_stock<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(path): Path<(String, String)>,
    Json(req): Json<SetStockRequest>,
) -> Result<Json<ItemResponse>, ApiError> {
    let (establishment_id, item_id) = ids(&path)?;
    let item = state
        .workflow
        .stock()
        .set_stock(establishment_id, item_id, req.quantity)
        .await?;
    Ok(Json(item.into()))
}

/// DELETE /establishments/{establishment_id}/items/{item_id}
#[tracing::instrument(skip(state))]
pub async fn archive<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(path): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let (establishment_id, item_id) = ids(&path)?;
    state.catalog.archive_item(establishment_id, item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
