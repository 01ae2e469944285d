//! Sale listing, completion, merging and the daily summary.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::{DateTime, NaiveDate, Utc};
use common::{EstablishmentId, SaleId, TableId};
use domain::{ItemSales, Money, OrderLine, Sale, SalesSummary};
use ordering::{OrderingError, ValidationError};
use serde::{Deserialize, Serialize};
use store::{SaleQuery, Store};

use super::{AppState, parse_id};
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct ListSalesQuery {
    #[serde(default)]
    pub incomplete: bool,
    pub table_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    /// UTC day; defaults to today.
    pub day: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct MergeSalesRequest {
    pub sale_ids: Vec<String>,
    pub description: String,
    /// Decimal string that must equal the sales' combined total.
    pub total_price: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct LineResponse {
    pub item_id: String,
    pub item_name: String,
    pub quantity: u32,
    pub subtotal: String,
}

impl From<OrderLine> for LineResponse {
    fn from(line: OrderLine) -> Self {
        Self {
            item_id: line.item_id.to_string(),
            item_name: line.item_name,
            quantity: line.quantity,
            subtotal: line.subtotal.to_decimal_string(),
        }
    }
}

#[derive(Serialize)]
pub struct SaleResponse {
    pub id: String,
    pub lines: Vec<LineResponse>,
    pub total_price: String,
    pub completed: bool,
    pub table_id: Option<String>,
    pub description: String,
    pub created_at: String,
}

impl From<Sale> for SaleResponse {
    fn from(sale: Sale) -> Self {
        Self {
            id: sale.id.to_string(),
            lines: sale.lines.into_iter().map(LineResponse::from).collect(),
            total_price: sale.total_price.to_decimal_string(),
            completed: sale.completed,
            table_id: sale.table_id.map(|id| id.to_string()),
            description: sale.description,
            created_at: sale.created_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct ItemSalesResponse {
    pub item_id: String,
    pub item_name: String,
    pub quantity: u64,
    pub revenue: String,
    /// Share of the day's revenue as a percentage, e.g. `"37.50"`.
    pub share: String,
}

impl From<ItemSales> for ItemSalesResponse {
    fn from(item: ItemSales) -> Self {
        Self {
            item_id: item.item_id.to_string(),
            item_name: item.item_name,
            quantity: item.quantity,
            revenue: item.revenue.to_decimal_string(),
            share: format!(
                "{}.{:02}",
                item.share_basis_points / 100,
                item.share_basis_points % 100
            ),
        }
    }
}

#[derive(Serialize)]
pub struct SummaryResponse {
    pub day: NaiveDate,
    pub sale_count: usize,
    pub total_revenue: String,
    pub items: Vec<ItemSalesResponse>,
}

impl From<SalesSummary> for SummaryResponse {
    fn from(summary: SalesSummary) -> Self {
        Self {
            day: summary.day,
            sale_count: summary.sale_count,
            total_revenue: summary.total_revenue.to_decimal_string(),
            items: summary
                .items
                .into_iter()
                .map(ItemSalesResponse::from)
                .collect(),
        }
    }
}

fn ids(raw: &(String, String)) -> Result<(EstablishmentId, SaleId), ApiError> {
    Ok((parse_id("establishment", &raw.0)?, parse_id("sale", &raw.1)?))
}

// -- Handlers --

/// GET /establishments/{establishment_id}/sales
#[tracing::instrument(skip(state, query))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(establishment_id): Path<String>,
    Query(query): Query<ListSalesQuery>,
) -> Result<Json<Vec<SaleResponse>>, ApiError> {
    let establishment_id: EstablishmentId = parse_id("establishment", &establishment_id)?;
    state.establishments.get(establishment_id).await?;

    let mut sale_query = SaleQuery::for_establishment(establishment_id);
    if query.incomplete {
        sale_query = sale_query.incomplete();
    }
    if let Some(raw) = &query.table_id {
        let table_id: TableId = parse_id("table", raw)?;
        sale_query = sale_query.table(table_id);
    }
    if let Some(from) = query.from {
        sale_query = sale_query.from_timestamp(from);
    }
    if let Some(to) = query.to {
        sale_query = sale_query.to_timestamp(to);
    }
    if let Some(limit) = query.limit {
        sale_query = sale_query.limit(limit);
    }

    let sales = state.workflow.sales().list(sale_query).await?;
    Ok(Json(sales.into_iter().map(SaleResponse::from).collect()))
}

/// GET /establishments/{establishment_id}/sales/{sale_id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(path): Path<(String, String)>,
) -> Result<Json<SaleResponse>, ApiError> {
    let (establishment_id, sale_id) = ids(&path)?;
    let sale = state.workflow.sales().get(establishment_id, sale_id).await?;
    Ok(Json(sale.into()))
}

/// POST /establishments/{establishment_id}/sales/{sale_id}/complete
#[tracing::instrument(skip(state))]
pub async fn complete<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(path): Path<(String, String)>,
) -> Result<Json<SaleResponse>, ApiError> {
    let (establishment_id, sale_id) = ids(&path)?;
    let sale = state
        .workflow
        .sales()
        .mark_complete(establishment_id, sale_id)
        .await?;
    Ok(Json(sale.into()))
}

/// POST /establishments/{establishment_id}/sales/merge
#[tracing::instrument(skip(state, req))]
pub async fn merge<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(establishment_id): Path<String>,
    Json(req): Json<MergeSalesRequest>,
) -> Result<Json<SaleResponse>, ApiError> {
    let establishment_id: EstablishmentId = parse_id("establishment", &establishment_id)?;
    let sale_ids = req
        .sale_ids
        .iter()
        .map(|raw| parse_id::<SaleId>("sale", raw))
        .collect::<Result<Vec<_>, _>>()?;
    let total = Money::parse(&req.total_price)
        .map_err(|e| ApiError::from(OrderingError::from(ValidationError::from(e))))?;

    let merged = state
        .workflow
        .sales()
        .merge_and_archive(&sale_ids, establishment_id, &req.description, total)
        .await?;
    Ok(Json(merged.into()))
}

/// GET /establishments/{establishment_id}/sales/summary
#[tracing::instrument(skip(state))]
pub async fn summary<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(establishment_id): Path<String>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let establishment_id: EstablishmentId = parse_id("establishment", &establishment_id)?;
    state.establishments.get(establishment_id).await?;
    let day = query.day.unwrap_or_else(|| Utc::now().date_naive());
    let summary = state
        .workflow
        .sales()
        .daily_summary(establishment_id, day)
        .await?;
    Ok(Json(summary.into()))
}
