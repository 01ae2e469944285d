//! Catalog maintenance. Quantities change only through the stock ledger.

use common::{EstablishmentId, ItemId};
use domain::{CatalogItem, ItemKind, Stock, UnitPrice};
use store::{ArchiveOutcome, ItemDetails, Store};

use crate::error::{OrderingError, Result, ValidationError};
use crate::establishments::active_establishment;

/// Fields of a new catalog item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub name: String,
    pub description: String,
    pub price: UnitPrice,
    pub stock: Stock,
}

fn check_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::Blank("name").into());
    }
    Ok(name.to_string())
}

fn check_price(price: UnitPrice) -> Result<UnitPrice> {
    if price.is_negative() {
        return Err(ValidationError::NegativePrice.into());
    }
    Ok(price)
}

#[derive(Clone)]
pub struct CatalogService<S: Store> {
    store: S,
}

impl<S: Store> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self, item), fields(name = %item.name))]
    pub async fn create_item(
        &self,
        establishment_id: EstablishmentId,
        item: NewItem,
    ) -> Result<CatalogItem> {
        active_establishment(&self.store, establishment_id).await?;
        let item = CatalogItem::new(
            establishment_id,
            check_name(&item.name)?,
            item.description.trim(),
            check_price(item.price)?,
            item.stock,
        );
        self.store.insert_item(item.clone()).await?;
        tracing::info!(item_id = %item.id, kind = item.kind().as_str(), "item created");
        Ok(item)
    }

    /// Returns an active item.
    pub async fn get_item(
        &self,
        establishment_id: EstablishmentId,
        item_id: ItemId,
    ) -> Result<CatalogItem> {
        self.store
            .find_item(establishment_id, item_id)
            .await?
            .filter(|item| !item.archived)
            .ok_or_else(|| OrderingError::not_found("Item", item_id))
    }

    /// Lists active items by name, optionally of one kind.
    pub async fn list_items(
        &self,
        establishment_id: EstablishmentId,
        kind: Option<ItemKind>,
    ) -> Result<Vec<CatalogItem>> {
        Ok(self.store.list_items(establishment_id, kind).await?)
    }

    #[tracing::instrument(skip(self, details))]
    pub async fn update_item(
        &self,
        establishment_id: EstablishmentId,
        item_id: ItemId,
        details: ItemDetails,
    ) -> Result<CatalogItem> {
        let details = ItemDetails {
            name: details.name.as_deref().map(check_name).transpose()?,
            description: details.description.map(|text| text.trim().to_string()),
            price: details.price.map(check_price).transpose()?,
        };
        self.store
            .update_item(establishment_id, item_id, details)
            .await?
            .ok_or_else(|| OrderingError::not_found("Item", item_id))
    }

    /// Archives an item. Archiving twice is a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn archive_item(
        &self,
        establishment_id: EstablishmentId,
        item_id: ItemId,
    ) -> Result<ArchiveOutcome> {
        match self.store.archive_item(establishment_id, item_id).await? {
            ArchiveOutcome::Missing => Err(OrderingError::not_found("Item", item_id)),
            outcome => Ok(outcome),
        }
    }
}
