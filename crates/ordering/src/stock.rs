//! Stock ledger: all-or-nothing decrements of stocked catalog items.

use common::{EstablishmentId, ItemId};
use domain::CatalogItem;
use store::{StockLine, StockOutcome, Store};

use crate::error::{OrderingError, Result, ValidationError};

/// Stock taken for one order.
///
/// `items` holds a snapshot of every resolved item in line order, with the
/// quantity left after the decrement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub lines: Vec<StockLine>,
    pub items: Vec<CatalogItem>,
}

impl Reservation {
    /// Returns the snapshot of one reserved item.
    pub fn item(&self, item_id: ItemId) -> Option<&CatalogItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    /// Returns the lines that actually moved stock.
    pub fn stocked_lines(&self) -> Vec<StockLine> {
        self.lines
            .iter()
            .filter(|line| self.item(line.item_id).is_some_and(CatalogItem::is_stocked))
            .copied()
            .collect()
    }

    /// Returns the snapshots of stocked items only.
    pub fn stocked_items(&self) -> Vec<CatalogItem> {
        self.items
            .iter()
            .filter(|item| item.is_stocked())
            .cloned()
            .collect()
    }
}

/// The only writer of catalog quantities.
#[derive(Clone)]
pub struct StockLedger<S: Store> {
    store: S,
}

impl<S: Store> StockLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Decrements every stocked line or none of them.
    ///
    /// Unresolved items are reported before shortfalls; either way the
    /// error lists every offending line.
    #[tracing::instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn reserve(
        &self,
        establishment_id: EstablishmentId,
        lines: &[StockLine],
    ) -> Result<Reservation> {
        match self.store.reserve_stock(establishment_id, lines).await? {
            StockOutcome::Reserved(items) => {
                tracing::debug!(items = items.len(), "stock reserved");
                Ok(Reservation {
                    lines: lines.to_vec(),
                    items,
                })
            }
            StockOutcome::Rejected { missing, short } => {
                metrics::counter!("stock_rejections_total").increment(1);
                if !missing.is_empty() {
                    tracing::info!(?missing, "reservation names unknown items");
                    return Err(OrderingError::ItemNotFound(missing));
                }
                tracing::info!(short = short.len(), "reservation exceeds stock on hand");
                Err(OrderingError::InsufficientStock(short))
            }
        }
    }

    /// Returns the quantities of an earlier reservation.
    #[tracing::instrument(skip(self, reservation))]
    pub async fn release(
        &self,
        establishment_id: EstablishmentId,
        reservation: &Reservation,
    ) -> Result<()> {
        let lines = reservation.stocked_lines();
        if lines.is_empty() {
            return Ok(());
        }
        self.store.release_stock(establishment_id, &lines).await?;
        tracing::debug!(lines = lines.len(), "stock released");
        Ok(())
    }

    /// Sets the quantity on hand of a stocked item.
    #[tracing::instrument(skip(self))]
    pub async fn set_stock(
        &self,
        establishment_id: EstablishmentId,
        item_id: ItemId,
        quantity: u32,
    ) -> Result<CatalogItem> {
        if let Some(item) = self.store.set_stock(establishment_id, item_id, quantity).await? {
            tracing::info!(%item_id, quantity, "stock set");
            return Ok(item);
        }
        match self.store.find_item(establishment_id, item_id).await? {
            Some(item) if !item.archived && !item.is_stocked() => {
                Err(ValidationError::UnlimitedItem { item_id }.into())
            }
            _ => Err(OrderingError::not_found("Item", item_id)),
        }
    }

    /// Returns the current snapshot of the given items, skipping any that
    /// are gone.
    pub async fn snapshot(
        &self,
        establishment_id: EstablishmentId,
        item_ids: &[ItemId],
    ) -> Result<Vec<CatalogItem>> {
        let mut items = Vec::with_capacity(item_ids.len());
        for item_id in item_ids {
            if let Some(item) = self.store.find_item(establishment_id, *item_id).await? {
                items.push(item);
            }
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use domain::{Establishment, Stock, UnitPrice};
    use store::InMemoryStore;

    use super::*;

    async fn setup() -> (StockLedger<InMemoryStore>, InMemoryStore, EstablishmentId) {
        let store = InMemoryStore::new();
        let establishment = Establishment::new("Diner", "1 Main St").unwrap();
        let establishment_id = establishment.id;
        store.insert_establishment(establishment).await.unwrap();
        (StockLedger::new(store.clone()), store, establishment_id)
    }

    async fn item(store: &InMemoryStore, establishment_id: EstablishmentId, stock: Stock) -> ItemId {
        let item = CatalogItem::new(
            establishment_id,
            "Burger",
            "",
            UnitPrice::from_cents(1_000),
            stock,
        );
        let id = item.id;
        store.insert_item(item).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_reserve_decrements_stocked_items_only() {
        let (ledger, store, est) = setup().await;
        let burger = item(&store, est, Stock::Counted(5)).await;
        let service = item(&store, est, Stock::Unlimited).await;

        let reservation = ledger
            .reserve(est, &[StockLine::new(burger, 2), StockLine::new(service, 9)])
            .await
            .unwrap();

        assert_eq!(reservation.item(burger).unwrap().stock, Stock::Counted(3));
        assert_eq!(reservation.stocked_lines(), vec![StockLine::new(burger, 2)]);
        assert_eq!(reservation.stocked_items().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_items_take_precedence() {
        let (ledger, store, est) = setup().await;
        let burger = item(&store, est, Stock::Counted(1)).await;
        let ghost = ItemId::new();

        let err = ledger
            .reserve(est, &[StockLine::new(burger, 4), StockLine::new(ghost, 1)])
            .await
            .unwrap_err();

        assert!(matches!(err, OrderingError::ItemNotFound(ids) if ids == vec![ghost]));
        let stored = store.find_item(est, burger).await.unwrap().unwrap();
        assert_eq!(stored.stock, Stock::Counted(1));
    }

    #[tokio::test]
    async fn test_release_restores_quantities() {
        let (ledger, store, est) = setup().await;
        let burger = item(&store, est, Stock::Counted(5)).await;

        let reservation = ledger
            .reserve(est, &[StockLine::new(burger, 5)])
            .await
            .unwrap();
        ledger.release(est, &reservation).await.unwrap();

        let stored = store.find_item(est, burger).await.unwrap().unwrap();
        assert_eq!(stored.stock, Stock::Counted(5));
    }

    #[tokio::test]
    async fn test_set_stock_rejects_unlimited_items() {
        let (ledger, store, est) = setup().await;
        let service = item(&store, est, Stock::Unlimited).await;

        let err = ledger.set_stock(est, service, 3).await.unwrap_err();
        assert!(matches!(
            err,
            OrderingError::Validation(ValidationError::UnlimitedItem { .. })
        ));

        let err = ledger.set_stock(est, ItemId::new(), 3).await.unwrap_err();
        assert!(matches!(err, OrderingError::NotFound { entity: "Item", .. }));
    }
}
