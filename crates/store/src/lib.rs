//! Persistence for the ordering core.
//!
//! The [`Store`] trait is implemented twice: [`InMemoryStore`] for tests and
//! single-process runs, and [`PostgresStore`] on top of sqlx.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use query::SaleQuery;
pub use store::{
    ArchiveOutcome, CompletionOutcome, ItemDetails, SaleMerge, Shortfall, StockLine, StockOutcome,
    Store, TableUpdate,
};
