//! Sale recorder: persists sales, completes them and merges settled tabs.

use chrono::NaiveDate;
use common::{CustomerId, EstablishmentId, SaleId, TableId};
use domain::{Delivery, Money, PricedOrder, Sale, SalesSummary, summarize};
use store::{ArchiveOutcome, CompletionOutcome, SaleMerge, SaleQuery, Store, StoreError};

use crate::error::{OrderingError, Result, ValidationError};

/// Where a delivery sale goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryTarget {
    pub customer_id: CustomerId,
    pub address: String,
}

/// Records and reads sales of one store.
#[derive(Clone)]
pub struct SaleRecorder<S: Store> {
    store: S,
}

impl<S: Store> SaleRecorder<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Persists a priced order as a sale, with its delivery record if any.
    #[tracing::instrument(skip(self, priced, delivery), fields(total = %priced.total()))]
    pub async fn record(
        &self,
        establishment_id: EstablishmentId,
        priced: &PricedOrder,
        description: &str,
        table_id: Option<TableId>,
        completed: bool,
        delivery: Option<DeliveryTarget>,
    ) -> Result<(Sale, Option<Delivery>)> {
        let sale = Sale::from_priced(establishment_id, priced, description, table_id, completed);
        let delivery = delivery
            .map(|target| {
                Delivery::new(sale.id, establishment_id, target.customer_id, &target.address)
            })
            .transpose()?;

        self.store.insert_sale(sale.clone(), delivery.clone()).await?;
        tracing::info!(sale_id = %sale.id, "sale recorded");
        Ok((sale, delivery))
    }

    /// Returns an active sale.
    pub async fn get(&self, establishment_id: EstablishmentId, sale_id: SaleId) -> Result<Sale> {
        self.store
            .find_sale(establishment_id, sale_id)
            .await?
            .filter(|sale| !sale.archived)
            .ok_or_else(|| OrderingError::not_found("Sale", sale_id))
    }

    /// Flips a pending sale to completed.
    #[tracing::instrument(skip(self))]
    pub async fn mark_complete(
        &self,
        establishment_id: EstablishmentId,
        sale_id: SaleId,
    ) -> Result<Sale> {
        match self.store.complete_sale(establishment_id, sale_id).await? {
            CompletionOutcome::Completed(sale) => {
                tracing::info!("sale completed");
                Ok(sale)
            }
            CompletionOutcome::AlreadyCompleted => Err(OrderingError::AlreadyCompleted(sale_id)),
            CompletionOutcome::Missing => Err(OrderingError::not_found("Sale", sale_id)),
        }
    }

    /// Archives a sale. Archiving twice is a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn archive(
        &self,
        establishment_id: EstablishmentId,
        sale_id: SaleId,
    ) -> Result<ArchiveOutcome> {
        let outcome = self.store.archive_sale(establishment_id, sale_id).await?;
        if outcome == ArchiveOutcome::Missing {
            return Err(OrderingError::not_found("Sale", sale_id));
        }
        Ok(outcome)
    }

    /// Builds the merge of `sale_ids` without writing it.
    ///
    /// Every sale must be active and their totals must add up to `total`.
    pub async fn prepare_merge(
        &self,
        establishment_id: EstablishmentId,
        sale_ids: &[SaleId],
        description: &str,
        total: Money,
        table_id: Option<TableId>,
    ) -> Result<SaleMerge> {
        let originals = self.load_active(establishment_id, sale_ids).await?;
        Self::build_merge(establishment_id, &originals, description, total, table_id)
    }

    /// Replaces `sale_ids` with one completed sale totalling `total`.
    ///
    /// The originals are archived in the same transaction that inserts the
    /// merged sale. Dine-in sales are refused: a table's tab is only settled
    /// by freeing the table, so the tab never points at an archived sale.
    #[tracing::instrument(skip(self, sale_ids), fields(sales = sale_ids.len()))]
    pub async fn merge_and_archive(
        &self,
        sale_ids: &[SaleId],
        establishment_id: EstablishmentId,
        description: &str,
        total: Money,
    ) -> Result<Sale> {
        let originals = self.load_active(establishment_id, sale_ids).await?;
        if let Some((sale_id, table_id)) = originals
            .iter()
            .find_map(|sale| sale.table_id.map(|table_id| (sale.id, table_id)))
        {
            return Err(ValidationError::TableSale { sale_id, table_id }.into());
        }

        let merge = Self::build_merge(establishment_id, &originals, description, total, None)?;
        let merged = merge.merged.clone();
        match self.store.merge_sales(merge).await {
            Ok(()) => {}
            Err(StoreError::StaleSales(ids)) => {
                let id = ids.first().map_or_else(String::new, ToString::to_string);
                return Err(OrderingError::NotFound { entity: "Sale", id });
            }
            Err(e) => return Err(e.into()),
        }
        tracing::info!(sale_id = %merged.id, "sales merged");
        Ok(merged)
    }

    /// Loads each distinct sale of `sale_ids`, in order.
    async fn load_active(
        &self,
        establishment_id: EstablishmentId,
        sale_ids: &[SaleId],
    ) -> Result<Vec<Sale>> {
        if sale_ids.is_empty() {
            return Err(OrderingError::NoSales);
        }

        let mut originals: Vec<Sale> = Vec::with_capacity(sale_ids.len());
        for sale_id in sale_ids {
            if originals.iter().any(|sale| sale.id == *sale_id) {
                continue;
            }
            originals.push(self.get(establishment_id, *sale_id).await?);
        }
        Ok(originals)
    }

    fn build_merge(
        establishment_id: EstablishmentId,
        originals: &[Sale],
        description: &str,
        total: Money,
        table_id: Option<TableId>,
    ) -> Result<SaleMerge> {
        let merged = Sale::consolidate(establishment_id, originals, description, table_id)?;
        if merged.total_price != total {
            return Err(ValidationError::TotalMismatch {
                expected: merged.total_price,
                provided: total,
            }
            .into());
        }

        Ok(SaleMerge {
            originals: originals.iter().map(|sale| sale.id).collect(),
            merged,
        })
    }

    /// Lists active sales matching `query`, oldest first.
    pub async fn list(&self, query: SaleQuery) -> Result<Vec<Sale>> {
        Ok(self.store.query_sales(query).await?)
    }

    /// Aggregates one UTC day of an establishment's sales.
    #[tracing::instrument(skip(self))]
    pub async fn daily_summary(
        &self,
        establishment_id: EstablishmentId,
        day: NaiveDate,
    ) -> Result<SalesSummary> {
        let sales = self
            .store
            .query_sales(SaleQuery::for_establishment(establishment_id).on_day(day))
            .await?;
        Ok(summarize(day, &sales))
    }

    /// Lists the deliveries of one customer, oldest first.
    pub async fn deliveries_for(
        &self,
        establishment_id: EstablishmentId,
        customer_id: CustomerId,
    ) -> Result<Vec<Delivery>> {
        Ok(self
            .store
            .list_deliveries(establishment_id, customer_id)
            .await?)
    }
}
