//! Daily sales aggregation.

use chrono::NaiveDate;
use common::ItemId;
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::sale::Sale;

/// Units and revenue of one item over a day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSales {
    pub item_id: ItemId,
    pub item_name: String,
    pub quantity: u64,
    pub revenue: Money,
    /// Share of the day's revenue in hundredths of a percent (10_000 = 100%).
    pub share_basis_points: u32,
}

/// Revenue of one establishment over one UTC day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesSummary {
    pub day: NaiveDate,
    pub sale_count: usize,
    pub total_revenue: Money,
    /// Sorted by share descending, then by name.
    pub items: Vec<ItemSales>,
}

fn share_of(revenue: Money, total: Money) -> u32 {
    if !total.is_positive() || revenue.is_negative() {
        return 0;
    }
    let scaled = (i128::from(revenue.cents()) * 10_000 * 2 + i128::from(total.cents()))
        / (i128::from(total.cents()) * 2);
    u32::try_from(scaled).unwrap_or(u32::MAX)
}

/// Aggregates the non-archived sales created on `day`.
///
/// Revenue comes from the recorded line subtotals, so an item's figure never
/// depends on its current catalog price. Settled tabs are counted once,
/// through their merged sale.
pub fn summarize(day: NaiveDate, sales: &[Sale]) -> SalesSummary {
    let mut items: Vec<ItemSales> = Vec::new();
    let mut total_revenue = Money::zero();
    let mut sale_count = 0;

    for sale in sales
        .iter()
        .filter(|sale| !sale.archived && sale.created_at.date_naive() == day)
    {
        sale_count += 1;
        for line in &sale.lines {
            total_revenue += line.subtotal;
            match items.iter_mut().find(|i| i.item_id == line.item_id) {
                Some(entry) => {
                    entry.quantity += u64::from(line.quantity);
                    entry.revenue += line.subtotal;
                }
                None => items.push(ItemSales {
                    item_id: line.item_id,
                    item_name: line.item_name.clone(),
                    quantity: u64::from(line.quantity),
                    revenue: line.subtotal,
                    share_basis_points: 0,
                }),
            }
        }
    }

    for entry in &mut items {
        entry.share_basis_points = share_of(entry.revenue, total_revenue);
    }
    items.sort_by(|a, b| {
        b.revenue
            .cmp(&a.revenue)
            .then_with(|| a.item_name.cmp(&b.item_name))
    });

    SalesSummary {
        day,
        sale_count,
        total_revenue,
        items,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use common::EstablishmentId;

    use super::*;
    use crate::money::UnitPrice;
    use crate::pricing::{PriceLine, price};
    use crate::sale::TAKEOUT_DESCRIPTION;

    fn sale(lines: &[(ItemId, &str, i64, u32)]) -> Sale {
        let lines: Vec<_> = lines
            .iter()
            .map(|(id, name, cents, qty)| {
                PriceLine::new(*id, *name, UnitPrice::from_cents(*cents), *qty)
            })
            .collect();
        Sale::from_priced(
            EstablishmentId::new(),
            &price(&lines).unwrap(),
            TAKEOUT_DESCRIPTION,
            None,
            true,
        )
    }

    #[test]
    fn test_summary_aggregates_and_sorts() {
        let tacos = ItemId::new();
        let soda = ItemId::new();
        let today = Utc::now().date_naive();

        let sales = vec![
            sale(&[(tacos, "Tacos", 300, 2), (soda, "Soda", 100, 1)]),
            sale(&[(soda, "Soda", 100, 3)]),
        ];
        let summary = summarize(today, &sales);

        assert_eq!(summary.sale_count, 2);
        assert_eq!(summary.total_revenue.cents(), 1000);
        assert_eq!(summary.items[0].item_name, "Tacos");
        assert_eq!(summary.items[0].share_basis_points, 6_000);
        assert_eq!(summary.items[1].quantity, 4);
        assert_eq!(summary.items[1].revenue.cents(), 400);
        assert_eq!(summary.items[1].share_basis_points, 4_000);
    }

    #[test]
    fn test_summary_skips_archived_and_other_days() {
        let tacos = ItemId::new();
        let today = Utc::now().date_naive();

        let mut archived = sale(&[(tacos, "Tacos", 300, 1)]);
        archived.archived = true;
        let mut yesterday = sale(&[(tacos, "Tacos", 300, 1)]);
        yesterday.created_at -= Duration::days(1);

        let summary = summarize(today, &[archived, yesterday]);
        assert_eq!(summary.sale_count, 0);
        assert!(summary.total_revenue.is_zero());
        assert!(summary.items.is_empty());
    }

    #[test]
    fn test_equal_revenue_sorted_by_name() {
        let today = Utc::now().date_naive();
        let sales = vec![sale(&[
            (ItemId::new(), "Water", 100, 1),
            (ItemId::new(), "Coffee", 100, 1),
        ])];
        let summary = summarize(today, &sales);
        assert_eq!(summary.items[0].item_name, "Coffee");
        assert_eq!(summary.items[1].item_name, "Water");
    }
}
