//! Catalog items: stocked goods and unlimited services.

use chrono::{DateTime, Utc};
use common::{EstablishmentId, ItemId};
use serde::{Deserialize, Serialize};

use crate::money::UnitPrice;

/// Whether an item has a counted quantity on hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// A good with a finite quantity on hand.
    Stocked,
    /// A service or other good that never runs out.
    Unlimited,
}

impl ItemKind {
    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Stocked => "stocked",
            ItemKind::Unlimited => "unlimited",
        }
    }

    /// Numeric code used by the persistence layer.
    pub fn code(&self) -> i16 {
        match self {
            ItemKind::Stocked => 0,
            ItemKind::Unlimited => 1,
        }
    }

    /// Decodes a persistence code.
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(ItemKind::Stocked),
            1 => Some(ItemKind::Unlimited),
            _ => None,
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Quantity on hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stock {
    Counted(u32),
    Unlimited,
}

impl Stock {
    /// Returns the item kind implied by this stock.
    pub fn kind(&self) -> ItemKind {
        match self {
            Stock::Counted(_) => ItemKind::Stocked,
            Stock::Unlimited => ItemKind::Unlimited,
        }
    }

    /// Returns the counted quantity, or `None` for unlimited stock.
    pub fn quantity(&self) -> Option<u32> {
        match self {
            Stock::Counted(quantity) => Some(*quantity),
            Stock::Unlimited => None,
        }
    }

    /// Returns true if `requested` units can be taken from this stock.
    pub fn covers(&self, requested: u32) -> bool {
        match self {
            Stock::Counted(quantity) => *quantity >= requested,
            Stock::Unlimited => true,
        }
    }
}

/// An item on an establishment's menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: ItemId,
    pub establishment_id: EstablishmentId,
    pub name: String,
    pub description: String,
    pub price: UnitPrice,
    pub stock: Stock,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
}

impl CatalogItem {
    /// Creates a new active catalog item.
    pub fn new(
        establishment_id: EstablishmentId,
        name: impl Into<String>,
        description: impl Into<String>,
        price: UnitPrice,
        stock: Stock,
    ) -> Self {
        Self {
            id: ItemId::new(),
            establishment_id,
            name: name.into(),
            description: description.into(),
            price,
            stock,
            archived: false,
            created_at: Utc::now(),
        }
    }

    /// Returns the item kind.
    pub fn kind(&self) -> ItemKind {
        self.stock.kind()
    }

    /// Returns true if the item has a counted quantity.
    pub fn is_stocked(&self) -> bool {
        self.kind() == ItemKind::Stocked
    }
}
