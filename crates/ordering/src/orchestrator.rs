//! Order workflow: reserve, price, record, seat, compensate.

use std::sync::Arc;
use std::time::Instant;

use common::EstablishmentId;
use domain::{CatalogItem, CredentialIssuer, Delivery, PricedOrder, Sale, TabChange, Table, price};
use store::Store;

use crate::cart::{Cart, Fulfillment};
use crate::error::Result;
use crate::establishments::active_establishment;
use crate::retry::RetryPolicy;
use crate::sales::{DeliveryTarget, SaleRecorder};
use crate::stock::{Reservation, StockLedger};
use crate::tables::TableTabManager;

/// An order as submitted by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    pub establishment_id: EstablishmentId,
    pub cart: Cart,
    pub fulfillment: Fulfillment,
    /// Record the sale as already completed.
    pub completed: bool,
}

/// Everything an accepted order changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderResult {
    pub sale: Sale,
    /// Stocked items of the cart with their current quantity.
    pub items: Vec<CatalogItem>,
    pub table: Option<Table>,
    pub tab_change: Option<TabChange>,
    pub delivery: Option<Delivery>,
}

/// Places orders against one store.
///
/// The workflow runs these steps, undoing earlier ones if a later one fails:
/// 1. Resolve the establishment and validate the cart
/// 2. Reserve stock for every line
/// 3. Price the cart from the reserved catalog snapshot
/// 4. Record the sale (and its delivery)
/// 5. For dine-in orders, add the sale to the table's tab
pub struct OrderWorkflow<S: Store> {
    store: S,
    stock: StockLedger<S>,
    sales: SaleRecorder<S>,
    tables: TableTabManager<S>,
}

impl<S: Store + Clone> OrderWorkflow<S> {
    pub fn new(store: S, issuer: Arc<dyn CredentialIssuer>, retry: RetryPolicy) -> Self {
        Self {
            stock: StockLedger::new(store.clone()),
            sales: SaleRecorder::new(store.clone()),
            tables: TableTabManager::new(store.clone(), issuer, retry),
            store,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn stock(&self) -> &StockLedger<S> {
        &self.stock
    }

    pub fn sales(&self) -> &SaleRecorder<S> {
        &self.sales
    }

    pub fn tables(&self) -> &TableTabManager<S> {
        &self.tables
    }

    /// Places an order.
    ///
    /// Either every effect of the order is applied or, after compensation,
    /// none is.
    #[tracing::instrument(
        skip(self, request),
        fields(
            establishment_id = %request.establishment_id,
            fulfillment = request.fulfillment.as_str(),
            lines = request.cart.lines().len(),
        )
    )]
    pub async fn place_order(&self, request: OrderRequest) -> Result<OrderResult> {
        let started = Instant::now();
        let fulfillment = request.fulfillment.as_str();
        let result = self.execute(request).await;

        match &result {
            Ok(order) => {
                metrics::counter!("orders_placed_total", "fulfillment" => fulfillment).increment(1);
                tracing::info!(sale_id = %order.sale.id, total = %order.sale.total_price, "order placed");
            }
            Err(e) => {
                metrics::counter!("orders_rejected_total", "reason" => e.kind()).increment(1);
                tracing::info!(error = %e, "order rejected");
            }
        }
        metrics::histogram!("order_placement_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn execute(&self, request: OrderRequest) -> Result<OrderResult> {
        let OrderRequest {
            establishment_id,
            cart,
            fulfillment,
            completed,
        } = request;

        // 1. Nothing below may run for a bad request
        active_establishment(&self.store, establishment_id).await?;
        cart.validate()?;
        fulfillment.validate()?;
        let table = match fulfillment.table_id() {
            Some(table_id) => Some(self.tables.get(establishment_id, table_id).await?),
            None => None,
        };

        // 2. Reserve stock
        let reservation = self
            .stock
            .reserve(establishment_id, &cart.stock_lines())
            .await?;

        // 3. Price from the snapshot taken with the reservation
        let priced = match Self::price_cart(&cart, &reservation) {
            Ok(priced) => priced,
            Err(e) => {
                self.compensate(establishment_id, &reservation, None).await;
                return Err(e);
            }
        };

        // 4. Record the sale
        let description = table
            .as_ref()
            .map_or_else(|| fulfillment.description().to_string(), |t| t.name().to_string());
        let delivery = match &fulfillment {
            Fulfillment::Delivery {
                customer_id,
                address,
                ..
            } => Some(DeliveryTarget {
                customer_id: *customer_id,
                address: address.trim().to_string(),
            }),
            _ => None,
        };
        let (sale, delivery) = match self
            .sales
            .record(
                establishment_id,
                &priced,
                &description,
                fulfillment.table_id(),
                completed,
                delivery,
            )
            .await
        {
            Ok(recorded) => recorded,
            Err(e) => {
                self.compensate(establishment_id, &reservation, None).await;
                return Err(e);
            }
        };

        // 5. Seat the sale on its table
        let (table, tab_change) = match fulfillment.table_id() {
            Some(table_id) => match self
                .tables
                .record_sale(establishment_id, table_id, &sale)
                .await
            {
                Ok((table, change)) => (Some(table), Some(change)),
                Err(e) => {
                    self.compensate(establishment_id, &reservation, Some(&sale))
                        .await;
                    return Err(e);
                }
            },
            None => (None, None),
        };

        let items = self.refreshed_items(establishment_id, &reservation).await;
        Ok(OrderResult {
            sale,
            items,
            table,
            tab_change,
            delivery,
        })
    }

    fn price_cart(cart: &Cart, reservation: &Reservation) -> Result<PricedOrder> {
        let lines = cart.price_lines(reservation)?;
        Ok(price(&lines)?)
    }

    /// Current stock of the cart's stocked items. Falls back to the
    /// reservation snapshot if the read fails, since the order is already
    /// committed.
    async fn refreshed_items(
        &self,
        establishment_id: EstablishmentId,
        reservation: &Reservation,
    ) -> Vec<CatalogItem> {
        let stocked = reservation.stocked_items();
        let ids: Vec<_> = stocked.iter().map(|item| item.id).collect();
        match self.stock.snapshot(establishment_id, &ids).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(error = %e, "stock refresh failed, returning reservation snapshot");
                stocked
            }
        }
    }

    /// Undoes the effects of a failed order. Failures here are logged and
    /// do not replace the error that caused the rollback.
    async fn compensate(
        &self,
        establishment_id: EstablishmentId,
        reservation: &Reservation,
        sale: Option<&Sale>,
    ) {
        metrics::counter!("order_compensations_total").increment(1);
        if let Some(sale) = sale {
            tracing::info!(sale_id = %sale.id, "archiving sale of failed order");
            if let Err(e) = self.sales.archive(establishment_id, sale.id).await {
                tracing::error!(sale_id = %sale.id, error = %e, "failed to archive sale");
            }
        }
        if let Err(e) = self.stock.release(establishment_id, reservation).await {
            tracing::error!(error = %e, "failed to release reserved stock");
        }
    }
}
