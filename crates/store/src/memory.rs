use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{CustomerId, EstablishmentId, ItemId, SaleId, TableId};
use domain::{CatalogItem, Delivery, Establishment, ItemKind, Sale, Stock, Table};
use tokio::sync::RwLock;

use crate::{
    Result, SaleQuery, StoreError,
    store::{
        ArchiveOutcome, CompletionOutcome, ItemDetails, SaleMerge, Shortfall, StockLine,
        StockOutcome, Store, TableUpdate,
    },
};

#[derive(Debug, Default)]
struct State {
    establishments: HashMap<EstablishmentId, Establishment>,
    items: HashMap<ItemId, CatalogItem>,
    sales: Vec<Sale>,
    sale_index: HashMap<SaleId, usize>,
    deliveries: Vec<Delivery>,
    tables: HashMap<TableId, Table>,
    fail_on_sale_insert: bool,
    fail_on_table_update: bool,
}

impl State {
    fn active_item(&self, establishment_id: EstablishmentId, item_id: ItemId) -> Option<&CatalogItem> {
        self.items
            .get(&item_id)
            .filter(|item| item.establishment_id == establishment_id && !item.archived)
    }

    fn sale_mut(&mut self, establishment_id: EstablishmentId, sale_id: SaleId) -> Option<&mut Sale> {
        let index = *self.sale_index.get(&sale_id)?;
        self.sales
            .get_mut(index)
            .filter(|sale| sale.establishment_id == establishment_id)
    }

    fn push_sale(&mut self, sale: Sale) {
        self.sale_index.insert(sale.id, self.sales.len());
        self.sales.push(sale);
    }

    fn stale_sales(&self, establishment_id: EstablishmentId, ids: &[SaleId]) -> Vec<SaleId> {
        ids.iter()
            .filter(|id| {
                !self
                    .sale_index
                    .get(id)
                    .and_then(|index| self.sales.get(*index))
                    .is_some_and(|sale| sale.establishment_id == establishment_id && !sale.archived)
            })
            .copied()
            .collect()
    }
}

/// In-memory store for tests and single-process deployments.
///
/// One lock guards all records, so every check-and-apply runs as a unit and
/// behaves like the PostgreSQL implementation's transactions.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the store to fail every sale insert.
    pub async fn set_fail_on_sale_insert(&self, fail: bool) {
        self.state.write().await.fail_on_sale_insert = fail;
    }

    /// Configures the store to fail every table update.
    pub async fn set_fail_on_table_update(&self, fail: bool) {
        self.state.write().await.fail_on_table_update = fail;
    }

    /// Returns the number of sales stored, archived ones included.
    pub async fn sale_count(&self) -> usize {
        self.state.read().await.sales.len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_establishment(&self, establishment: Establishment) -> Result<()> {
        let mut state = self.state.write().await;
        state.establishments.insert(establishment.id, establishment);
        Ok(())
    }

    async fn find_establishment(&self, id: EstablishmentId) -> Result<Option<Establishment>> {
        Ok(self.state.read().await.establishments.get(&id).cloned())
    }

    async fn archive_establishment(&self, id: EstablishmentId) -> Result<ArchiveOutcome> {
        let mut state = self.state.write().await;
        Ok(match state.establishments.get_mut(&id) {
            None => ArchiveOutcome::Missing,
            Some(establishment) if establishment.archived => ArchiveOutcome::AlreadyArchived,
            Some(establishment) => {
                establishment.archived = true;
                ArchiveOutcome::Archived
            }
        })
    }

    async fn insert_item(&self, item: CatalogItem) -> Result<()> {
        let mut state = self.state.write().await;
        state.items.insert(item.id, item);
        Ok(())
    }

    async fn find_item(
        &self,
        establishment_id: EstablishmentId,
        item_id: ItemId,
    ) -> Result<Option<CatalogItem>> {
        let state = self.state.read().await;
        Ok(state
            .items
            .get(&item_id)
            .filter(|item| item.establishment_id == establishment_id)
            .cloned())
    }

    async fn list_items(
        &self,
        establishment_id: EstablishmentId,
        kind: Option<ItemKind>,
    ) -> Result<Vec<CatalogItem>> {
        let state = self.state.read().await;
        let mut items: Vec<_> = state
            .items
            .values()
            .filter(|item| item.establishment_id == establishment_id && !item.archived)
            .filter(|item| kind.is_none_or(|kind| item.kind() == kind))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn update_item(
        &self,
        establishment_id: EstablishmentId,
        item_id: ItemId,
        details: ItemDetails,
    ) -> Result<Option<CatalogItem>> {
        let mut state = self.state.write().await;
        let Some(item) = state
            .items
            .get_mut(&item_id)
            .filter(|item| item.establishment_id == establishment_id && !item.archived)
        else {
            return Ok(None);
        };
        if let Some(name) = details.name {
            item.name = name;
        }
        if let Some(description) = details.description {
            item.description = description;
        }
        if let Some(price) = details.price {
            item.price = price;
        }
        Ok(Some(item.clone()))
    }

    async fn archive_item(
        &self,
        establishment_id: EstablishmentId,
        item_id: ItemId,
    ) -> Result<ArchiveOutcome> {
        let mut state = self.state.write().await;
        Ok(
            match state
                .items
                .get_mut(&item_id)
                .filter(|item| item.establishment_id == establishment_id)
            {
                None => ArchiveOutcome::Missing,
                Some(item) if item.archived => ArchiveOutcome::AlreadyArchived,
                Some(item) => {
                    item.archived = true;
                    ArchiveOutcome::Archived
                }
            },
        )
    }

    async fn reserve_stock(
        &self,
        establishment_id: EstablishmentId,
        lines: &[StockLine],
    ) -> Result<StockOutcome> {
        let mut state = self.state.write().await;

        let mut missing = Vec::new();
        let mut short = Vec::new();
        for line in lines {
            match state.active_item(establishment_id, line.item_id) {
                None => missing.push(line.item_id),
                Some(item) => {
                    if let Stock::Counted(available) = item.stock
                        && available < line.quantity
                    {
                        short.push(Shortfall {
                            item_id: item.id,
                            item_name: item.name.clone(),
                            requested: line.quantity,
                            available,
                        });
                    }
                }
            }
        }
        if !missing.is_empty() || !short.is_empty() {
            return Ok(StockOutcome::Rejected { missing, short });
        }

        let mut reserved = Vec::with_capacity(lines.len());
        for line in lines {
            let item = state
                .items
                .get_mut(&line.item_id)
                .ok_or_else(|| StoreError::Corrupt(format!("item {} vanished", line.item_id)))?;
            if let Stock::Counted(available) = item.stock {
                item.stock = Stock::Counted(available - line.quantity);
            }
            reserved.push(item.clone());
        }
        Ok(StockOutcome::Reserved(reserved))
    }

    async fn release_stock(
        &self,
        establishment_id: EstablishmentId,
        lines: &[StockLine],
    ) -> Result<()> {
        let mut state = self.state.write().await;
        for line in lines {
            if let Some(item) = state
                .items
                .get_mut(&line.item_id)
                .filter(|item| item.establishment_id == establishment_id)
                && let Stock::Counted(available) = item.stock
            {
                item.stock = Stock::Counted(available.saturating_add(line.quantity));
            }
        }
        Ok(())
    }

    async fn set_stock(
        &self,
        establishment_id: EstablishmentId,
        item_id: ItemId,
        quantity: u32,
    ) -> Result<Option<CatalogItem>> {
        let mut state = self.state.write().await;
        let Some(item) = state.items.get_mut(&item_id).filter(|item| {
            item.establishment_id == establishment_id && !item.archived && item.is_stocked()
        }) else {
            return Ok(None);
        };
        item.stock = Stock::Counted(quantity);
        Ok(Some(item.clone()))
    }

    async fn insert_sale(&self, sale: Sale, delivery: Option<Delivery>) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_on_sale_insert {
            return Err(StoreError::Unavailable("sale insert disabled".to_string()));
        }
        state.push_sale(sale);
        if let Some(delivery) = delivery {
            state.deliveries.push(delivery);
        }
        Ok(())
    }

    async fn find_sale(
        &self,
        establishment_id: EstablishmentId,
        sale_id: SaleId,
    ) -> Result<Option<Sale>> {
        let state = self.state.read().await;
        Ok(state
            .sale_index
            .get(&sale_id)
            .and_then(|index| state.sales.get(*index))
            .filter(|sale| sale.establishment_id == establishment_id)
            .cloned())
    }

    async fn complete_sale(
        &self,
        establishment_id: EstablishmentId,
        sale_id: SaleId,
    ) -> Result<CompletionOutcome> {
        let mut state = self.state.write().await;
        Ok(match state.sale_mut(establishment_id, sale_id) {
            Some(sale) if sale.archived => CompletionOutcome::Missing,
            None => CompletionOutcome::Missing,
            Some(sale) if sale.completed => CompletionOutcome::AlreadyCompleted,
            Some(sale) => {
                sale.completed = true;
                CompletionOutcome::Completed(sale.clone())
            }
        })
    }

    async fn archive_sale(
        &self,
        establishment_id: EstablishmentId,
        sale_id: SaleId,
    ) -> Result<ArchiveOutcome> {
        let mut state = self.state.write().await;
        Ok(match state.sale_mut(establishment_id, sale_id) {
            None => ArchiveOutcome::Missing,
            Some(sale) if sale.archived => ArchiveOutcome::AlreadyArchived,
            Some(sale) => {
                sale.archived = true;
                ArchiveOutcome::Archived
            }
        })
    }

    async fn merge_sales(&self, merge: SaleMerge) -> Result<()> {
        let mut state = self.state.write().await;
        let establishment_id = merge.merged.establishment_id;
        let stale = state.stale_sales(establishment_id, &merge.originals);
        if !stale.is_empty() {
            return Err(StoreError::StaleSales(stale));
        }
        for id in &merge.originals {
            if let Some(sale) = state.sale_mut(establishment_id, *id) {
                sale.archived = true;
            }
        }
        state.push_sale(merge.merged);
        Ok(())
    }

    async fn query_sales(&self, query: SaleQuery) -> Result<Vec<Sale>> {
        let state = self.state.read().await;
        let mut sales: Vec<_> = state
            .sales
            .iter()
            .filter(|sale| query.matches(sale))
            .cloned()
            .collect();
        sales.sort_by_key(|sale| sale.created_at);
        if let Some(limit) = query.limit {
            sales.truncate(limit);
        }
        Ok(sales)
    }

    async fn list_deliveries(
        &self,
        establishment_id: EstablishmentId,
        customer_id: CustomerId,
    ) -> Result<Vec<Delivery>> {
        let state = self.state.read().await;
        Ok(state
            .deliveries
            .iter()
            .filter(|d| {
                d.establishment_id == establishment_id && d.customer_id == customer_id && !d.archived
            })
            .cloned()
            .collect())
    }

    async fn insert_table(&self, table: Table) -> Result<()> {
        let mut state = self.state.write().await;
        state.tables.insert(table.id(), table);
        Ok(())
    }

    async fn find_table(
        &self,
        establishment_id: EstablishmentId,
        table_id: TableId,
    ) -> Result<Option<Table>> {
        let state = self.state.read().await;
        Ok(state
            .tables
            .get(&table_id)
            .filter(|table| table.establishment_id() == establishment_id)
            .cloned())
    }

    async fn list_tables(&self, establishment_id: EstablishmentId) -> Result<Vec<Table>> {
        let state = self.state.read().await;
        let mut tables: Vec<_> = state
            .tables
            .values()
            .filter(|table| table.establishment_id() == establishment_id && !table.is_archived())
            .cloned()
            .collect();
        tables.sort_by(|a, b| a.name().cmp(b.name()).then(a.id().cmp(&b.id())));
        Ok(tables)
    }

    async fn update_table(&self, update: TableUpdate) -> Result<Table> {
        let mut state = self.state.write().await;
        if state.fail_on_table_update {
            return Err(StoreError::Unavailable("table update disabled".to_string()));
        }

        let mut table = update.table;
        let table_id = table.id();
        let stored = state
            .tables
            .get(&table_id)
            .ok_or(StoreError::TableNotFound(table_id))?;
        if stored.version() != table.version() {
            tracing::debug!(
                %table_id,
                expected = %table.version(),
                actual = %stored.version(),
                "table version conflict"
            );
            return Err(StoreError::ConcurrencyConflict {
                table_id,
                expected: table.version(),
                actual: stored.version(),
            });
        }

        if let Some(credential) = table.credential().filter(|_| !table.is_archived()) {
            let taken = state.tables.values().any(|other| {
                other.id() != table_id
                    && !other.is_archived()
                    && other
                        .credential()
                        .is_some_and(|c| c.token() == credential.token())
            });
            if taken {
                return Err(StoreError::TokenTaken { table_id });
            }
        }

        if let Some(merge) = update.merge {
            let establishment_id = merge.merged.establishment_id;
            let stale = state.stale_sales(establishment_id, &merge.originals);
            if !stale.is_empty() {
                return Err(StoreError::StaleSales(stale));
            }
            for id in &merge.originals {
                if let Some(sale) = state.sale_mut(establishment_id, *id) {
                    sale.archived = true;
                }
            }
            state.push_sale(merge.merged);
        }

        table.advance_version();
        state.tables.insert(table_id, table.clone());
        Ok(table)
    }

    async fn find_table_by_credential(
        &self,
        token: &str,
        passcode: u32,
    ) -> Result<Option<Table>> {
        let state = self.state.read().await;
        Ok(state
            .tables
            .values()
            .find(|table| {
                !table.is_archived()
                    && table
                        .credential()
                        .is_some_and(|credential| credential.matches(token, passcode))
            })
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use common::Version;
    use domain::{Credential, CredentialIssuer, Money, UnitPrice};

    use super::*;

    struct FixedIssuer(&'static str);

    impl CredentialIssuer for FixedIssuer {
        fn issue(&self) -> Credential {
            Credential::new(self.0, 123_456)
        }
    }

    async fn seeded() -> (InMemoryStore, EstablishmentId, CatalogItem, CatalogItem) {
        let store = InMemoryStore::new();
        let establishment = Establishment::new("Diner", "Main St").unwrap();
        let establishment_id = establishment.id;
        store.insert_establishment(establishment).await.unwrap();

        let burger = CatalogItem::new(
            establishment_id,
            "Burger",
            "",
            UnitPrice::from_cents(1250),
            Stock::Counted(3),
        );
        let corkage = CatalogItem::new(
            establishment_id,
            "Corkage",
            "",
            UnitPrice::from_cents(500),
            Stock::Unlimited,
        );
        store.insert_item(burger.clone()).await.unwrap();
        store.insert_item(corkage.clone()).await.unwrap();
        (store, establishment_id, burger, corkage)
    }

    #[tokio::test]
    async fn reserve_is_all_or_nothing() {
        let (store, establishment_id, burger, corkage) = seeded().await;

        let outcome = store
            .reserve_stock(
                establishment_id,
                &[StockLine::new(corkage.id, 9), StockLine::new(burger.id, 4)],
            )
            .await
            .unwrap();
        let StockOutcome::Rejected { missing, short } = outcome else {
            panic!("expected rejection");
        };
        assert!(missing.is_empty());
        assert_eq!(short.len(), 1);
        assert_eq!(short[0].available, 3);

        let burger_now = store
            .find_item(establishment_id, burger.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(burger_now.stock, Stock::Counted(3));
    }

    #[tokio::test]
    async fn reserve_and_release() {
        let (store, establishment_id, burger, corkage) = seeded().await;
        let lines = [StockLine::new(burger.id, 2), StockLine::new(corkage.id, 5)];

        let StockOutcome::Reserved(items) =
            store.reserve_stock(establishment_id, &lines).await.unwrap()
        else {
            panic!("expected reservation");
        };
        assert_eq!(items[0].stock, Stock::Counted(1));
        assert_eq!(items[1].stock, Stock::Unlimited);

        store.release_stock(establishment_id, &lines).await.unwrap();
        let burger_now = store
            .find_item(establishment_id, burger.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(burger_now.stock, Stock::Counted(3));
    }

    #[tokio::test]
    async fn items_are_scoped_by_establishment() {
        let (store, _, burger, _) = seeded().await;
        let other = EstablishmentId::new();

        assert!(store.find_item(other, burger.id).await.unwrap().is_none());
        let outcome = store
            .reserve_stock(other, &[StockLine::new(burger.id, 1)])
            .await
            .unwrap();
        assert_eq!(
            outcome,
            StockOutcome::Rejected {
                missing: vec![burger.id],
                short: vec![],
            }
        );
    }

    #[tokio::test]
    async fn table_update_checks_version() {
        let store = InMemoryStore::new();
        let table = Table::new(EstablishmentId::new(), "T1").unwrap();
        store.insert_table(table.clone()).await.unwrap();

        let mut first = table.clone();
        first.occupy(&FixedIssuer("aaaaaa")).unwrap();
        let written = store.update_table(TableUpdate::new(first)).await.unwrap();
        assert_eq!(written.version(), Version::new(2));

        let mut stale = table;
        stale.reserve(&FixedIssuer("bbbbbb")).unwrap();
        let result = store.update_table(TableUpdate::new(stale)).await;
        assert!(matches!(
            result,
            Err(StoreError::ConcurrencyConflict { .. })
        ));
    }

    #[tokio::test]
    async fn table_update_rejects_taken_token() {
        let store = InMemoryStore::new();
        let establishment_id = EstablishmentId::new();
        let first = Table::new(establishment_id, "T1").unwrap();
        let second = Table::new(establishment_id, "T2").unwrap();
        store.insert_table(first.clone()).await.unwrap();
        store.insert_table(second.clone()).await.unwrap();

        let mut first = first;
        first.occupy(&FixedIssuer("samesa")).unwrap();
        store.update_table(TableUpdate::new(first)).await.unwrap();

        let mut second = second;
        second.occupy(&FixedIssuer("samesa")).unwrap();
        let result = store.update_table(TableUpdate::new(second)).await;
        assert!(matches!(result, Err(StoreError::TokenTaken { .. })));
    }

    #[tokio::test]
    async fn merge_rejects_archived_originals() {
        let (store, establishment_id, burger, _) = seeded().await;
        let priced = domain::price(&[domain::PriceLine::new(
            burger.id,
            "Burger",
            burger.price,
            1,
        )])
        .unwrap();
        let sale = Sale::from_priced(establishment_id, &priced, "T1", None, false);
        store.insert_sale(sale.clone(), None).await.unwrap();
        store.archive_sale(establishment_id, sale.id).await.unwrap();

        let merged = Sale::consolidate(establishment_id, &[sale.clone()], "T1", None).unwrap();
        let result = store
            .merge_sales(SaleMerge {
                originals: vec![sale.id],
                merged,
            })
            .await;
        assert!(matches!(result, Err(StoreError::StaleSales(ids)) if ids == vec![sale.id]));
        assert_eq!(store.sale_count().await, 1);
        assert_eq!(sale.total_price, Money::from_cents(1250));
    }
}
