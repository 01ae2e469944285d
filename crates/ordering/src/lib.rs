//! Ordering services over a [`store::Store`].
//!
//! - [`StockLedger`] takes and returns catalog stock, all or nothing
//! - [`SaleRecorder`] records sales and merges settled tabs
//! - [`TableTabManager`] drives the table state machine and its tab
//! - [`OrderWorkflow`] places orders across all three, compensating on failure
//!
//! Catalog and establishment maintenance live in [`CatalogService`] and
//! [`EstablishmentService`].

pub mod cart;
pub mod catalog;
pub mod error;
pub mod establishments;
pub mod orchestrator;
pub mod retry;
pub mod sales;
pub mod stock;
pub mod tables;

pub use cart::{Cart, CartLine, Fulfillment};
pub use catalog::{CatalogService, NewItem};
pub use error::{OrderingError, Result, ValidationError};
pub use establishments::EstablishmentService;
pub use orchestrator::{OrderRequest, OrderResult, OrderWorkflow};
pub use retry::{DEFAULT_MAX_ATTEMPTS, RetryPolicy};
pub use sales::{DeliveryTarget, SaleRecorder};
pub use stock::{Reservation, StockLedger};
pub use tables::{CREDENTIAL_ATTEMPTS, TableTabManager, TableTransition};
