use async_trait::async_trait;
use common::{CustomerId, EstablishmentId, ItemId, SaleId, TableId};
use domain::{CatalogItem, Delivery, Establishment, ItemKind, Sale, Table, UnitPrice};

use crate::{Result, SaleQuery};

/// Quantity of one item taken from or returned to stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLine {
    pub item_id: ItemId,
    pub quantity: u32,
}

impl StockLine {
    pub fn new(item_id: ItemId, quantity: u32) -> Self {
        Self { item_id, quantity }
    }
}

/// A stocked line that asked for more than is on hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortfall {
    pub item_id: ItemId,
    pub item_name: String,
    pub requested: u32,
    pub available: u32,
}

/// Result of a stock reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockOutcome {
    /// Every line was applied. Items are in line order with their stock
    /// after the decrement.
    Reserved(Vec<CatalogItem>),

    /// Nothing was applied. Every unresolved item and every short line is
    /// listed.
    Rejected {
        missing: Vec<ItemId>,
        short: Vec<Shortfall>,
    },
}

/// Result of archiving a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Archived,
    AlreadyArchived,
    Missing,
}

/// Result of marking a sale as completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    Completed(Sale),
    AlreadyCompleted,
    Missing,
}

/// Editable catalog fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemDetails {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<UnitPrice>,
}

/// A consolidated sale replacing the open sales of a tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleMerge {
    pub originals: Vec<SaleId>,
    pub merged: Sale,
}

/// A table write, optionally carrying the settlement of its tab.
///
/// The table's version is the one it was read at; the write only succeeds
/// if the stored row is still at that version. When `merge` is present the
/// merged sale is inserted and the originals archived in the same
/// transaction.
#[derive(Debug, Clone)]
pub struct TableUpdate {
    pub table: Table,
    pub merge: Option<SaleMerge>,
}

impl TableUpdate {
    pub fn new(table: Table) -> Self {
        Self { table, merge: None }
    }
}

/// Persistence for establishments, catalog, sales, deliveries and tables.
///
/// Lookups are keyed by establishment so a record of one establishment is
/// never visible through another. All implementations must be thread-safe.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_establishment(&self, establishment: Establishment) -> Result<()>;

    /// Returns the establishment, archived or not.
    async fn find_establishment(&self, id: EstablishmentId) -> Result<Option<Establishment>>;

    async fn archive_establishment(&self, id: EstablishmentId) -> Result<ArchiveOutcome>;

    async fn insert_item(&self, item: CatalogItem) -> Result<()>;

    /// Returns the item, archived or not.
    async fn find_item(
        &self,
        establishment_id: EstablishmentId,
        item_id: ItemId,
    ) -> Result<Option<CatalogItem>>;

    /// Lists active items ordered by name, optionally of one kind.
    async fn list_items(
        &self,
        establishment_id: EstablishmentId,
        kind: Option<ItemKind>,
    ) -> Result<Vec<CatalogItem>>;

    /// Updates an active item. Returns `None` if it is missing or archived.
    async fn update_item(
        &self,
        establishment_id: EstablishmentId,
        item_id: ItemId,
        details: ItemDetails,
    ) -> Result<Option<CatalogItem>>;

    async fn archive_item(
        &self,
        establishment_id: EstablishmentId,
        item_id: ItemId,
    ) -> Result<ArchiveOutcome>;

    /// Decrements every stocked line, all or nothing.
    ///
    /// Each decrement is conditional on enough quantity being on hand at
    /// the moment it is applied. Lines must name distinct items.
    async fn reserve_stock(
        &self,
        establishment_id: EstablishmentId,
        lines: &[StockLine],
    ) -> Result<StockOutcome>;

    /// Returns quantities taken by an earlier reservation.
    async fn release_stock(
        &self,
        establishment_id: EstablishmentId,
        lines: &[StockLine],
    ) -> Result<()>;

    /// Sets the quantity of an active stocked item. Returns `None` if it is
    /// missing, archived or unlimited.
    async fn set_stock(
        &self,
        establishment_id: EstablishmentId,
        item_id: ItemId,
        quantity: u32,
    ) -> Result<Option<CatalogItem>>;

    /// Inserts a sale with its lines and optional delivery as one unit.
    async fn insert_sale(&self, sale: Sale, delivery: Option<Delivery>) -> Result<()>;

    /// Returns the sale, archived or not.
    async fn find_sale(
        &self,
        establishment_id: EstablishmentId,
        sale_id: SaleId,
    ) -> Result<Option<Sale>>;

    /// Flips an active sale to completed if it is not already.
    async fn complete_sale(
        &self,
        establishment_id: EstablishmentId,
        sale_id: SaleId,
    ) -> Result<CompletionOutcome>;

    async fn archive_sale(
        &self,
        establishment_id: EstablishmentId,
        sale_id: SaleId,
    ) -> Result<ArchiveOutcome>;

    /// Inserts the merged sale and archives the originals in one transaction.
    ///
    /// Fails with `StaleSales` if any original is missing or archived.
    async fn merge_sales(&self, merge: SaleMerge) -> Result<()>;

    async fn query_sales(&self, query: SaleQuery) -> Result<Vec<Sale>>;

    /// Lists active deliveries of one customer, oldest first.
    async fn list_deliveries(
        &self,
        establishment_id: EstablishmentId,
        customer_id: CustomerId,
    ) -> Result<Vec<Delivery>>;

    /// Inserts a new table.
    async fn insert_table(&self, table: Table) -> Result<()>;

    /// Returns the table, archived or not.
    async fn find_table(
        &self,
        establishment_id: EstablishmentId,
        table_id: TableId,
    ) -> Result<Option<Table>>;

    /// Lists active tables ordered by name.
    async fn list_tables(&self, establishment_id: EstablishmentId) -> Result<Vec<Table>>;

    /// Writes a table with compare-and-swap on its version.
    ///
    /// Returns the table as stored, at its new version.
    async fn update_table(&self, update: TableUpdate) -> Result<Table>;

    /// Finds the active table holding exactly this credential.
    async fn find_table_by_credential(&self, token: &str, passcode: u32)
    -> Result<Option<Table>>;
}
