use common::{SaleId, TableId, Version};
use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A table write lost a compare-and-swap race.
    #[error(
        "Concurrency conflict for table {table_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        table_id: TableId,
        expected: Version,
        actual: Version,
    },

    /// Another active table already holds the token being written.
    #[error("Access token already in use (table {table_id})")]
    TokenTaken { table_id: TableId },

    /// Sales named in a merge are missing or already archived.
    #[error("Sales no longer open: {0:?}")]
    StaleSales(Vec<SaleId>),

    /// The table to update does not exist.
    #[error("Table not found: {0}")]
    TableNotFound(TableId),

    /// The backend refused the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be decoded.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Returns true if retrying from a fresh read may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::ConcurrencyConflict { .. } | StoreError::StaleSales(_)
        )
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
