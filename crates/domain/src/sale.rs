//! Sales and their order lines.

use chrono::{DateTime, Utc};
use common::{EstablishmentId, ItemId, SaleId, TableId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::Money;
use crate::pricing::{PricedLine, PricedOrder};

/// Description given to orders that are neither dine-in nor delivery.
pub const TAKEOUT_DESCRIPTION: &str = "Takeout";

/// Description given to delivery orders when the caller supplies none.
pub const DELIVERY_DESCRIPTION: &str = "Delivery";

/// Errors raised while combining sales.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaleError {
    /// A folded quantity or subtotal leaves its integer range.
    #[error("Merged amounts overflow at item {item_id}")]
    Overflow { item_id: ItemId },

    /// The merged total leaves the cent range.
    #[error("Merged total overflows")]
    TotalOverflow,

    /// A merge needs at least one sale.
    #[error("No sales to consolidate")]
    Empty,
}

/// A priced line of a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub item_id: ItemId,
    pub item_name: String,
    pub quantity: u32,
    pub subtotal: Money,
}

impl From<&PricedLine> for OrderLine {
    fn from(line: &PricedLine) -> Self {
        Self {
            item_id: line.item_id,
            item_name: line.item_name.clone(),
            quantity: line.quantity,
            subtotal: line.subtotal,
        }
    }
}

impl OrderLine {
    /// Adds `other`'s quantity and subtotal to this line.
    fn fold(&mut self, other: &OrderLine) -> Result<(), SaleError> {
        let overflow = || SaleError::Overflow {
            item_id: other.item_id,
        };
        self.quantity = self.quantity.checked_add(other.quantity).ok_or_else(overflow)?;
        self.subtotal = self.subtotal.checked_add(other.subtotal).ok_or_else(overflow)?;
        Ok(())
    }
}

/// A recorded transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub id: SaleId,
    pub establishment_id: EstablishmentId,
    pub lines: Vec<OrderLine>,
    pub total_price: Money,
    pub completed: bool,
    pub table_id: Option<TableId>,
    pub description: String,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
}

impl Sale {
    /// Creates a sale from a priced order.
    pub fn from_priced(
        establishment_id: EstablishmentId,
        priced: &PricedOrder,
        description: impl Into<String>,
        table_id: Option<TableId>,
        completed: bool,
    ) -> Self {
        Self {
            id: SaleId::new(),
            establishment_id,
            lines: priced.lines().iter().map(OrderLine::from).collect(),
            total_price: priced.total(),
            completed,
            table_id,
            description: description.into(),
            archived: false,
            created_at: Utc::now(),
        }
    }

    /// Builds one completed sale holding the lines of every sale in `originals`.
    ///
    /// Lines for the same item are folded into the first one seen, summing
    /// quantities and subtotals, so the result keeps one line per item. The
    /// total is the sum of the originals' totals. Fails instead of wrapping
    /// when a folded amount leaves its range.
    pub fn consolidate(
        establishment_id: EstablishmentId,
        originals: &[Sale],
        description: impl Into<String>,
        table_id: Option<TableId>,
    ) -> Result<Self, SaleError> {
        if originals.is_empty() {
            return Err(SaleError::Empty);
        }

        let mut lines: Vec<OrderLine> = Vec::new();
        let mut total_price = Money::zero();
        for sale in originals {
            total_price = total_price
                .checked_add(sale.total_price)
                .ok_or(SaleError::TotalOverflow)?;

            for line in &sale.lines {
                match lines.iter_mut().find(|l| l.item_id == line.item_id) {
                    Some(existing) => existing.fold(line)?,
                    None => lines.push(line.clone()),
                }
            }
        }

        Ok(Self {
            id: SaleId::new(),
            establishment_id,
            lines,
            total_price,
            completed: true,
            table_id,
            description: description.into(),
            archived: false,
            created_at: Utc::now(),
        })
    }

    /// Returns the sum of the line subtotals.
    pub fn lines_total(&self) -> Money {
        self.lines.iter().map(|line| line.subtotal).sum()
    }

    /// Returns the line for `item_id`, if any.
    pub fn line_for(&self, item_id: ItemId) -> Option<&OrderLine> {
        self.lines.iter().find(|line| line.item_id == item_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::UnitPrice;
    use crate::pricing::{PriceLine, price};

    fn sale_of(establishment: EstablishmentId, lines: &[(ItemId, &str, i64, u32)]) -> Sale {
        let lines: Vec<_> = lines
            .iter()
            .map(|(id, name, cents, qty)| {
                PriceLine::new(*id, *name, UnitPrice::from_cents(*cents), *qty)
            })
            .collect();
        let priced = price(&lines).unwrap();
        Sale::from_priced(establishment, &priced, TAKEOUT_DESCRIPTION, None, false)
    }

    #[test]
    fn test_from_priced_keeps_order_and_total() {
        let establishment = EstablishmentId::new();
        let fries = ItemId::new();
        let soda = ItemId::new();
        let sale = sale_of(establishment, &[(fries, "Fries", 350, 2), (soda, "Soda", 125, 1)]);

        assert_eq!(sale.lines[0].item_id, fries);
        assert_eq!(sale.lines[1].item_id, soda);
        assert_eq!(sale.total_price.cents(), 825);
        assert_eq!(sale.total_price, sale.lines_total());
        assert!(!sale.completed);
        assert_eq!(sale.description, "Takeout");
    }

    #[test]
    fn test_consolidate_folds_repeated_items() {
        let establishment = EstablishmentId::new();
        let table = TableId::new();
        let burger = ItemId::new();
        let beer = ItemId::new();

        let first = sale_of(establishment, &[(burger, "Burger", 1000, 1), (beer, "Beer", 250, 1)]);
        let second = sale_of(establishment, &[(beer, "Beer", 250, 2)]);

        let merged =
            Sale::consolidate(establishment, &[first.clone(), second.clone()], "T1", Some(table))
                .unwrap();

        assert!(merged.completed);
        assert!(!merged.archived);
        assert_eq!(merged.description, "T1");
        assert_eq!(merged.table_id, Some(table));
        assert_eq!(merged.lines.len(), 2);
        assert_eq!(merged.lines[0].item_id, burger);
        let beer_line = merged.line_for(beer).unwrap();
        assert_eq!(beer_line.quantity, 3);
        assert_eq!(beer_line.subtotal.cents(), 750);
        assert_eq!(merged.total_price, first.total_price + second.total_price);
        assert_eq!(merged.total_price, merged.lines_total());
    }

    #[test]
    fn test_consolidate_rejects_quantity_overflow() {
        let establishment = EstablishmentId::new();
        let water = ItemId::new();
        let first = sale_of(establishment, &[(water, "Water", 0, 3_000_000_000)]);
        let second = sale_of(establishment, &[(water, "Water", 0, 3_000_000_000)]);

        let result = Sale::consolidate(establishment, &[first, second], "T1", None);

        assert_eq!(result, Err(SaleError::Overflow { item_id: water }));
    }

    #[test]
    fn test_consolidate_rejects_subtotal_overflow() {
        let establishment = EstablishmentId::new();
        let wine = ItemId::new();
        let mut first = sale_of(establishment, &[(wine, "Wine", 100, 1)]);
        first.lines[0].subtotal = Money::from_cents(i64::MAX);
        first.total_price = Money::from_cents(1);
        let second = sale_of(establishment, &[(wine, "Wine", 100, 1)]);

        let result = Sale::consolidate(establishment, &[first, second], "T1", None);

        assert_eq!(result, Err(SaleError::Overflow { item_id: wine }));
    }

    #[test]
    fn test_consolidate_requires_a_sale() {
        let result = Sale::consolidate(EstablishmentId::new(), &[], "T1", None);
        assert_eq!(result, Err(SaleError::Empty));
    }
}
