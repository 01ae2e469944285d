//! Order placement.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{CustomerId, EstablishmentId, ItemId, TableId};
use domain::{TabChange, UnitPrice};
use ordering::{
    Cart, CartLine, Fulfillment, OrderRequest, OrderResult, OrderingError, ValidationError,
};
use serde::{Deserialize, Serialize};
use store::Store;

use super::catalog::ItemResponse;
use super::deliveries::DeliveryResponse;
use super::sales::SaleResponse;
use super::tables::TableResponse;
use super::{AppState, parse_id};
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    pub lines: Vec<OrderLineRequest>,
    #[serde(default)]
    pub fulfillment: FulfillmentRequest,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Deserialize)]
pub struct OrderLineRequest {
    pub item_id: String,
    pub quantity: u32,
    /// Price the client expects, as a decimal string.
    pub unit_price: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FulfillmentRequest {
    #[default]
    Takeout,
    DineIn {
        table_id: String,
    },
    Delivery {
        customer_id: String,
        address: String,
        description: Option<String>,
    },
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub sale: SaleResponse,
    /// Stocked items of the order with their remaining quantity.
    pub items: Vec<ItemResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<TableResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab_change: Option<TabChange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DeliveryResponse>,
}

impl From<OrderResult> for OrderResponse {
    fn from(result: OrderResult) -> Self {
        Self {
            sale: result.sale.into(),
            items: result.items.into_iter().map(ItemResponse::from).collect(),
            table: result.table.map(TableResponse::from),
            tab_change: result.tab_change,
            delivery: result.delivery.map(DeliveryResponse::from),
        }
    }
}

fn cart_line(line: &OrderLineRequest) -> Result<CartLine, ApiError> {
    let item_id: ItemId = parse_id("item", &line.item_id)?;
    let mut cart_line = CartLine::new(item_id, line.quantity);
    if let Some(raw) = &line.unit_price {
        let unit_price = UnitPrice::parse(raw)
            .map_err(|e| ApiError::from(OrderingError::from(ValidationError::from(e))))?;
        cart_line = cart_line.with_unit_price(unit_price);
    }
    Ok(cart_line)
}

impl TryFrom<FulfillmentRequest> for Fulfillment {
    type Error = ApiError;

    fn try_from(req: FulfillmentRequest) -> Result<Self, Self::Error> {
        Ok(match req {
            FulfillmentRequest::Takeout => Fulfillment::Takeout,
            FulfillmentRequest::DineIn { table_id } => Fulfillment::DineIn {
                table_id: parse_id::<TableId>("table", &table_id)?,
            },
            FulfillmentRequest::Delivery {
                customer_id,
                address,
                description,
            } => Fulfillment::Delivery {
                customer_id: parse_id::<CustomerId>("customer", &customer_id)?,
                address,
                description,
            },
        })
    }
}

// -- Handlers --

/// POST /establishments/{establishment_id}/orders
///
/// The workflow runs on its own task so a client that disconnects midway
/// cannot leave an order half applied.
#[tracing::instrument(skip(state, req))]
pub async fn place<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(establishment_id): Path<String>,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let establishment_id: EstablishmentId = parse_id("establishment", &establishment_id)?;
    let lines = req
        .lines
        .iter()
        .map(cart_line)
        .collect::<Result<Vec<_>, _>>()?;
    let request = OrderRequest {
        establishment_id,
        cart: Cart::new(lines),
        fulfillment: req.fulfillment.try_into()?,
        completed: req.completed,
    };

    let workflow = Arc::clone(&state.workflow);
    let result = tokio::spawn(async move { workflow.place_order(request).await })
        .await
        .map_err(|e| ApiError::Internal(format!("order task failed: {e}")))??;

    Ok((StatusCode::CREATED, Json(result.into())))
}
