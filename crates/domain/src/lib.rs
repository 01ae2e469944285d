//! Domain layer for the ordering core.
//!
//! This crate provides the pure building blocks of the point of sale:
//! - Money and catalog unit prices with per-line rounding
//! - Catalog items with counted or unlimited stock
//! - The order pricer and the sale record
//! - The table state machine and its running tab
//! - Access credentials and daily sales reports

pub mod catalog;
pub mod credential;
pub mod establishment;
pub mod money;
pub mod pricing;
pub mod report;
pub mod sale;
pub mod table;

pub use catalog::{CatalogItem, ItemKind, Stock};
pub use credential::{Credential, CredentialIssuer, RandomCredentialIssuer};
pub use establishment::{Delivery, Establishment, RecordError};
pub use money::{Money, MoneyParseError, UnitPrice};
pub use pricing::{PriceLine, PricedLine, PricedOrder, PricingError, price};
pub use report::{ItemSales, SalesSummary, summarize};
pub use sale::{DELIVERY_DESCRIPTION, OrderLine, Sale, SaleError, TAKEOUT_DESCRIPTION};
pub use table::{Availability, Settlement, TabChange, Table, TableError, TableParts};
