//! Ordering error types.

use common::{EstablishmentId, ItemId, SaleId, TableId};
use domain::{
    Money, MoneyParseError, PricingError, RecordError, SaleError, TableError, UnitPrice,
};
use store::{Shortfall, StoreError};
use thiserror::Error;

/// Input rejected before or while an operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A cart line asks for zero units.
    #[error("Quantity for item {item_id} must be greater than 0")]
    ZeroQuantity { item_id: ItemId },

    /// The same item appears on two cart lines.
    #[error("Item {item_id} appears more than once in the order")]
    DuplicateItem { item_id: ItemId },

    /// A delivery order has no address.
    #[error("Delivery address must not be empty")]
    EmptyAddress,

    /// The client priced a line differently from the catalog.
    #[error("Price for item {item_id} is {expected}, not {provided}")]
    PriceMismatch {
        item_id: ItemId,
        expected: UnitPrice,
        provided: UnitPrice,
    },

    /// A line cannot be priced.
    #[error("Invalid line for item {item_id}: {reason}")]
    InvalidLine {
        item_id: ItemId,
        reason: &'static str,
    },

    /// An amount left the representable range.
    #[error("Amount overflow")]
    Overflow,

    /// A catalog price is below zero.
    #[error("Price must not be negative")]
    NegativePrice,

    /// An amount could not be parsed.
    #[error(transparent)]
    Amount(#[from] MoneyParseError),

    /// A required text field is empty.
    #[error("Field {0} must not be empty")]
    Blank(&'static str),

    /// A merge total differs from the sum of the sales it replaces.
    #[error("Sales total {expected}, not {provided}")]
    TotalMismatch { expected: Money, provided: Money },

    /// Dine-in sales are settled through their table, not merged directly.
    #[error("Sale {sale_id} belongs to table {table_id}; free the table to settle it")]
    TableSale { sale_id: SaleId, table_id: TableId },

    /// Unlimited items have no quantity to restock.
    #[error("Item {item_id} has unlimited stock")]
    UnlimitedItem { item_id: ItemId },
}

/// Errors that can occur during ordering operations.
#[derive(Debug, Error)]
pub enum OrderingError {
    /// The establishment does not exist or is archived.
    #[error("Establishment not found: {0}")]
    EstablishmentNotFound(EstablishmentId),

    /// A record does not exist, is archived, or belongs elsewhere.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The order had no lines.
    #[error("No order provided")]
    NoOrderProvided,

    /// Input was rejected.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Cart items that do not resolve to active catalog items.
    #[error("Items not found: {0:?}")]
    ItemNotFound(Vec<ItemId>),

    /// Every line that asked for more than is on hand.
    #[error("Insufficient stock for {} item(s)", .0.len())]
    InsufficientStock(Vec<Shortfall>),

    /// The state change is not allowed.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// The sale was completed earlier.
    #[error("Sale already completed: {0}")]
    AlreadyCompleted(SaleId),

    /// A merge was requested without sales.
    #[error("No sales to merge")]
    NoSales,

    /// A concurrent writer got there first.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The store failed or kept conflicting.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl OrderingError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        OrderingError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderingError::EstablishmentNotFound(_) => "establishment_not_found",
            OrderingError::NotFound { .. } => "not_found",
            OrderingError::NoOrderProvided => "no_order_provided",
            OrderingError::Validation(_) => "validation",
            OrderingError::ItemNotFound(_) => "item_not_found",
            OrderingError::InsufficientStock(_) => "insufficient_stock",
            OrderingError::InvalidTransition { .. } => "invalid_transition",
            OrderingError::AlreadyCompleted(_) => "already_completed",
            OrderingError::NoSales => "no_sales",
            OrderingError::Conflict(_) => "conflict",
            OrderingError::StorageUnavailable(_) => "storage_unavailable",
        }
    }
}

impl From<StoreError> for OrderingError {
    fn from(error: StoreError) -> Self {
        if error.is_conflict() {
            OrderingError::Conflict(error.to_string())
        } else {
            OrderingError::StorageUnavailable(error.to_string())
        }
    }
}

impl From<PricingError> for OrderingError {
    fn from(error: PricingError) -> Self {
        match error {
            PricingError::InvalidLine { item_id, reason } => {
                ValidationError::InvalidLine { item_id, reason }.into()
            }
            PricingError::Overflow { .. } => ValidationError::Overflow.into(),
        }
    }
}

impl From<RecordError> for OrderingError {
    fn from(error: RecordError) -> Self {
        match error {
            RecordError::Blank(field) => ValidationError::Blank(field).into(),
        }
    }
}

impl From<SaleError> for OrderingError {
    fn from(error: SaleError) -> Self {
        match error {
            SaleError::Overflow { .. } | SaleError::TotalOverflow => ValidationError::Overflow.into(),
            SaleError::Empty => OrderingError::NoSales,
        }
    }
}

impl From<TableError> for OrderingError {
    fn from(error: TableError) -> Self {
        match error {
            TableError::InvalidTransition { from, to } => OrderingError::InvalidTransition {
                from: from.to_string(),
                to: to.to_string(),
            },
            TableError::TabOpen { availability, .. } => OrderingError::InvalidTransition {
                from: availability.to_string(),
                to: "ARCHIVED".to_string(),
            },
            TableError::Archived(table_id) => OrderingError::not_found("Table", table_id),
            TableError::InvalidName => ValidationError::Blank("name").into(),
            TableError::Overflow => ValidationError::Overflow.into(),
        }
    }
}

/// Convenience type alias for ordering results.
pub type Result<T> = std::result::Result<T, OrderingError>;
