//! Identifier and version types shared by every crate in the workspace.

mod types;

pub use types::{CustomerId, DeliveryId, EstablishmentId, ItemId, SaleId, TableId, Version};
