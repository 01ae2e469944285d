//! Establishments and delivery records.

use chrono::{DateTime, Utc};
use common::{CustomerId, DeliveryId, EstablishmentId, SaleId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when building an establishment or delivery.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// A required text field is empty.
    #[error("Field {0} must not be empty")]
    Blank(&'static str),
}

fn required(field: &'static str, value: &str) -> Result<String, RecordError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RecordError::Blank(field));
    }
    Ok(trimmed.to_string())
}

/// A restaurant. Every other record is scoped to one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Establishment {
    pub id: EstablishmentId,
    pub name: String,
    pub address: String,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
}

impl Establishment {
    pub fn new(name: &str, address: &str) -> Result<Self, RecordError> {
        Ok(Self {
            id: EstablishmentId::new(),
            name: required("name", name)?,
            address: required("address", address)?,
            archived: false,
            created_at: Utc::now(),
        })
    }
}

/// Where a delivery order goes. Created together with its sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub id: DeliveryId,
    pub sale_id: SaleId,
    pub establishment_id: EstablishmentId,
    pub customer_id: CustomerId,
    pub address: String,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
}

impl Delivery {
    pub fn new(
        sale_id: SaleId,
        establishment_id: EstablishmentId,
        customer_id: CustomerId,
        address: &str,
    ) -> Result<Self, RecordError> {
        Ok(Self {
            id: DeliveryId::new(),
            sale_id,
            establishment_id,
            customer_id,
            address: required("address", address)?,
            archived: false,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_establishment_trims_fields() {
        let establishment = Establishment::new("  Casa Lupe ", "Main St 1").unwrap();
        assert_eq!(establishment.name, "Casa Lupe");
        assert!(!establishment.archived);
    }

    #[test]
    fn test_blank_fields_rejected() {
        assert_eq!(
            Establishment::new("", "Main St 1").unwrap_err(),
            RecordError::Blank("name")
        );
        let result = Delivery::new(
            SaleId::new(),
            EstablishmentId::new(),
            CustomerId::new(),
            "   ",
        );
        assert_eq!(result.unwrap_err(), RecordError::Blank("address"));
    }
}
