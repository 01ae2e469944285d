//! Order pricing.
//!
//! Each line subtotal is rounded half-up at the cent before the lines are
//! summed. Rounding the sum once can differ by a cent from this; the
//! per-line order is the one clients already reconcile against.

use common::ItemId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::{Money, UnitPrice};

/// Errors raised while pricing an order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    /// A line has a zero quantity or a negative unit price.
    #[error("Invalid line for item {item_id}: {reason}")]
    InvalidLine {
        item_id: ItemId,
        reason: &'static str,
    },

    /// A subtotal or the total does not fit in the cent range.
    #[error("Price overflow at item {item_id}")]
    Overflow { item_id: ItemId },
}

/// A line to be priced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceLine {
    pub item_id: ItemId,
    pub item_name: String,
    pub unit_price: UnitPrice,
    pub quantity: u32,
}

impl PriceLine {
    /// Creates a new price line.
    pub fn new(
        item_id: ItemId,
        item_name: impl Into<String>,
        unit_price: UnitPrice,
        quantity: u32,
    ) -> Self {
        Self {
            item_id,
            item_name: item_name.into(),
            unit_price,
            quantity,
        }
    }
}

/// A priced line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub item_id: ItemId,
    pub item_name: String,
    pub unit_price: UnitPrice,
    pub quantity: u32,
    pub subtotal: Money,
}

/// The result of pricing a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedOrder {
    lines: Vec<PricedLine>,
    total: Money,
}

impl PricedOrder {
    /// Returns the priced lines in input order.
    pub fn lines(&self) -> &[PricedLine] {
        &self.lines
    }

    /// Returns the order total.
    pub fn total(&self) -> Money {
        self.total
    }
}

/// Prices `lines`, preserving their order.
pub fn price(lines: &[PriceLine]) -> Result<PricedOrder, PricingError> {
    let mut priced = Vec::with_capacity(lines.len());
    let mut total = Money::zero();

    for line in lines {
        if line.quantity == 0 {
            return Err(PricingError::InvalidLine {
                item_id: line.item_id,
                reason: "quantity must be greater than 0",
            });
        }
        if line.unit_price.is_negative() {
            return Err(PricingError::InvalidLine {
                item_id: line.item_id,
                reason: "unit price must not be negative",
            });
        }

        let subtotal = line
            .unit_price
            .extend(line.quantity)
            .ok_or(PricingError::Overflow {
                item_id: line.item_id,
            })?;
        total = total.checked_add(subtotal).ok_or(PricingError::Overflow {
            item_id: line.item_id,
        })?;

        priced.push(PricedLine {
            item_id: line.item_id,
            item_name: line.item_name.clone(),
            unit_price: line.unit_price,
            quantity: line.quantity,
            subtotal,
        });
    }

    Ok(PricedOrder {
        lines: priced,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: &str, quantity: u32) -> PriceLine {
        PriceLine::new(
            ItemId::new(),
            "Item",
            UnitPrice::parse(price).unwrap(),
            quantity,
        )
    }

    #[test]
    fn test_subtotals_and_total() {
        let order = price(&[line("12.50", 1), line("3.25", 3)]).unwrap();
        assert_eq!(order.lines()[0].subtotal.cents(), 1250);
        assert_eq!(order.lines()[1].subtotal.cents(), 975);
        assert_eq!(order.total().cents(), 2225);
    }

    #[test]
    fn test_rounds_each_line_before_summing() {
        // 0.125 + 0.125 is 0.25 when summed first, 0.26 line by line.
        let order = price(&[line("0.125", 1), line("0.125", 1)]).unwrap();
        assert_eq!(order.lines()[0].subtotal.cents(), 13);
        assert_eq!(order.total().cents(), 26);
    }

    #[test]
    fn test_total_equals_sum_of_subtotals() {
        let order = price(&[line("1.005", 7), line("2.3333", 3), line("0.01", 1)]).unwrap();
        let sum: Money = order.lines().iter().map(|l| l.subtotal).sum();
        assert_eq!(order.total(), sum);
    }

    #[test]
    fn test_pricing_is_deterministic() {
        let lines = vec![line("4.4444", 9), line("0.995", 2)];
        assert_eq!(price(&lines).unwrap(), price(&lines).unwrap());
    }

    #[test]
    fn test_preserves_input_order() {
        let lines = vec![line("1.00", 1), line("2.00", 1), line("3.00", 1)];
        let order = price(&lines).unwrap();
        let ids: Vec<_> = order.lines().iter().map(|l| l.item_id).collect();
        let expected: Vec<_> = lines.iter().map(|l| l.item_id).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_zero_quantity_is_invalid() {
        let result = price(&[line("1.00", 0)]);
        assert!(matches!(result, Err(PricingError::InvalidLine { .. })));
    }

    #[test]
    fn test_negative_price_is_invalid() {
        let result = price(&[line("-1.00", 2)]);
        assert!(matches!(result, Err(PricingError::InvalidLine { .. })));
    }

    #[test]
    fn test_overflow_is_reported() {
        let huge = PriceLine::new(
            ItemId::new(),
            "Gold",
            UnitPrice::from_ten_thousandths(i64::MAX),
            u32::MAX,
        );
        assert!(matches!(
            price(&[huge]),
            Err(PricingError::Overflow { .. })
        ));
    }

    #[test]
    fn test_empty_order_is_free() {
        let order = price(&[]).unwrap();
        assert!(order.lines().is_empty());
        assert!(order.total().is_zero());
    }
}
