//! Carts and how an order leaves the kitchen.

use common::{CustomerId, ItemId, TableId};
use domain::{DELIVERY_DESCRIPTION, PriceLine, TAKEOUT_DESCRIPTION, UnitPrice};
use store::StockLine;

use crate::error::{OrderingError, Result, ValidationError};
use crate::stock::Reservation;

/// One line of a cart.
///
/// `unit_price` is what the client believes the item costs; when present it
/// must equal the catalog price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLine {
    pub item_id: ItemId,
    pub quantity: u32,
    pub unit_price: Option<UnitPrice>,
}

impl CartLine {
    pub fn new(item_id: ItemId, quantity: u32) -> Self {
        Self {
            item_id,
            quantity,
            unit_price: None,
        }
    }

    pub fn with_unit_price(mut self, unit_price: UnitPrice) -> Self {
        self.unit_price = Some(unit_price);
        self
    }
}

/// The lines of an order, in the order the client listed them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new(lines: Vec<CartLine>) -> Self {
        Self { lines }
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Rejects empty carts, zero quantities and repeated items.
    pub fn validate(&self) -> Result<()> {
        if self.lines.is_empty() {
            return Err(OrderingError::NoOrderProvided);
        }
        for (index, line) in self.lines.iter().enumerate() {
            if line.quantity == 0 {
                return Err(ValidationError::ZeroQuantity {
                    item_id: line.item_id,
                }
                .into());
            }
            if self.lines[..index]
                .iter()
                .any(|earlier| earlier.item_id == line.item_id)
            {
                return Err(ValidationError::DuplicateItem {
                    item_id: line.item_id,
                }
                .into());
            }
        }
        Ok(())
    }

    pub fn stock_lines(&self) -> Vec<StockLine> {
        self.lines
            .iter()
            .map(|line| StockLine::new(line.item_id, line.quantity))
            .collect()
    }

    /// Builds the pricer's input from the reserved catalog snapshot.
    pub fn price_lines(&self, reservation: &Reservation) -> Result<Vec<PriceLine>> {
        let mut priced = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            let item = reservation
                .item(line.item_id)
                .ok_or_else(|| OrderingError::ItemNotFound(vec![line.item_id]))?;
            if let Some(provided) = line.unit_price
                && provided != item.price
            {
                return Err(ValidationError::PriceMismatch {
                    item_id: item.id,
                    expected: item.price,
                    provided,
                }
                .into());
            }
            priced.push(PriceLine::new(
                item.id,
                item.name.clone(),
                item.price,
                line.quantity,
            ));
        }
        Ok(priced)
    }
}

/// How an order is served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fulfillment {
    Takeout,
    DineIn {
        table_id: TableId,
    },
    Delivery {
        customer_id: CustomerId,
        address: String,
        description: Option<String>,
    },
}

impl Fulfillment {
    pub fn validate(&self) -> Result<()> {
        if let Fulfillment::Delivery { address, .. } = self
            && address.trim().is_empty()
        {
            return Err(ValidationError::EmptyAddress.into());
        }
        Ok(())
    }

    pub fn table_id(&self) -> Option<TableId> {
        match self {
            Fulfillment::DineIn { table_id } => Some(*table_id),
            _ => None,
        }
    }

    /// Sale description for orders not served at a table.
    pub fn description(&self) -> &str {
        match self {
            Fulfillment::Delivery {
                description: Some(text),
                ..
            } if !text.trim().is_empty() => text.trim(),
            Fulfillment::Delivery { .. } => DELIVERY_DESCRIPTION,
            _ => TAKEOUT_DESCRIPTION,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Fulfillment::Takeout => "takeout",
            Fulfillment::DineIn { .. } => "dine_in",
            Fulfillment::Delivery { .. } => "delivery",
        }
    }
}

#[cfg(test)]
mod tests {
    use common::EstablishmentId;
    use domain::{CatalogItem, Stock};

    use super::*;

    #[test]
    fn test_empty_cart_is_rejected() {
        assert!(matches!(
            Cart::default().validate(),
            Err(OrderingError::NoOrderProvided)
        ));
    }

    #[test]
    fn test_zero_quantity_and_duplicates_are_rejected() {
        let item = ItemId::new();
        let zero = Cart::new(vec![CartLine::new(item, 0)]);
        assert!(matches!(
            zero.validate(),
            Err(OrderingError::Validation(ValidationError::ZeroQuantity { .. }))
        ));

        let twice = Cart::new(vec![CartLine::new(item, 1), CartLine::new(item, 2)]);
        assert!(matches!(
            twice.validate(),
            Err(OrderingError::Validation(ValidationError::DuplicateItem { item_id })) if item_id == item
        ));
    }

    #[test]
    fn test_price_mismatch_is_rejected() {
        let item = CatalogItem::new(
            EstablishmentId::new(),
            "Soup",
            "",
            UnitPrice::from_cents(450),
            Stock::Unlimited,
        );
        let reservation = Reservation {
            lines: vec![StockLine::new(item.id, 1)],
            items: vec![item.clone()],
        };

        let honest = Cart::new(vec![
            CartLine::new(item.id, 1).with_unit_price(UnitPrice::from_cents(450)),
        ]);
        let lines = honest.price_lines(&reservation).unwrap();
        assert_eq!(lines[0].item_name, "Soup");

        let stale = Cart::new(vec![
            CartLine::new(item.id, 1).with_unit_price(UnitPrice::from_cents(400)),
        ]);
        assert!(matches!(
            stale.price_lines(&reservation),
            Err(OrderingError::Validation(ValidationError::PriceMismatch { .. }))
        ));
    }

    #[test]
    fn test_descriptions() {
        assert_eq!(Fulfillment::Takeout.description(), "Takeout");
        let delivery = Fulfillment::Delivery {
            customer_id: CustomerId::new(),
            address: "9 Elm St".into(),
            description: None,
        };
        assert_eq!(delivery.description(), "Delivery");
        assert!(delivery.validate().is_ok());

        let blank = Fulfillment::Delivery {
            customer_id: CustomerId::new(),
            address: "  ".into(),
            description: Some("Ring twice".into()),
        };
        assert_eq!(blank.description(), "Ring twice");
        assert!(matches!(
            blank.validate(),
            Err(OrderingError::Validation(ValidationError::EmptyAddress))
        ));
    }
}
