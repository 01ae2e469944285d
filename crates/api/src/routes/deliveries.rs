//! Deliveries per customer.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{CustomerId, EstablishmentId};
use domain::Delivery;
use serde::Serialize;
use store::Store;

use super::{AppState, parse_id};
use crate::error::ApiError;

#[derive(Serialize)]
pub struct DeliveryResponse {
    pub id: String,
    pub sale_id: String,
    pub customer_id: String,
    pub address: String,
    pub created_at: String,
}

impl From<Delivery> for DeliveryResponse {
    fn from(delivery: Delivery) -> Self {
        Self {
            id: delivery.id.to_string(),
            sale_id: delivery.sale_id.to_string(),
            customer_id: delivery.customer_id.to_string(),
            address: delivery.address,
            created_at: delivery.created_at.to_rfc3339(),
        }
    }
}

/// GET /establishments/{establishment_id}/customers/{customer_id}/deliveries
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((establishment_id, customer_id)): Path<(String, String)>,
) -> Result<Json<Vec<DeliveryResponse>>, ApiError> {
    let establishment_id: EstablishmentId = parse_id("establishment", &establishment_id)?;
    let customer_id: CustomerId = parse_id("customer", &customer_id)?;
    state.establishments.get(establishment_id).await?;
    let deliveries = state
        .workflow
        .sales()
        .deliveries_for(establishment_id, customer_id)
        .await?;
    Ok(Json(
        deliveries.into_iter().map(DeliveryResponse::from).collect(),
    ))
}
