//! Integration tests for the table tab lifecycle.
//!
//! These tests drive a table through whole service cycles and check that
//! the tab always agrees with the sales it holds.

use common::{EstablishmentId, ItemId};
use domain::{
    Availability, Credential, CredentialIssuer, PriceLine, RandomCredentialIssuer, Sale,
    TabChange, Table, TableError, UnitPrice, price,
};

fn sale_for(table: &Table, lines: &[(&str, &str, u32)]) -> Sale {
    let lines: Vec<_> = lines
        .iter()
        .map(|(name, unit, qty)| {
            PriceLine::new(ItemId::new(), *name, UnitPrice::parse(unit).unwrap(), *qty)
        })
        .collect();
    Sale::from_priced(
        table.establishment_id(),
        &price(&lines).unwrap(),
        table.name(),
        Some(table.id()),
        false,
    )
}

mod service_cycle {
    use super::*;

    #[test]
    fn occupy_append_settle() {
        let issuer = RandomCredentialIssuer;
        let mut table = Table::new(EstablishmentId::new(), "T1").unwrap();

        let first = sale_for(&table, &[("Burger", "12.50", 1), ("Fries", "3.25", 1)]);
        let change = table
            .record_sale(first.id, first.total_price, &issuer)
            .unwrap();
        assert_eq!(change, TabChange::Opened);
        assert_eq!(table.running_total().cents(), 1575);
        let credential = table.credential().cloned().unwrap();

        let second = sale_for(&table, &[("Beer", "4.20", 1)]);
        let change = table
            .record_sale(second.id, second.total_price, &issuer)
            .unwrap();
        assert_eq!(change, TabChange::Appended);
        assert_eq!(table.credential(), Some(&credential));
        assert_eq!(table.running_total().cents(), 1995);

        let settlement = table.free(&issuer).unwrap().unwrap();
        let merged = Sale::consolidate(
            table.establishment_id(),
            &[first.clone(), second.clone()],
            settlement.description.clone(),
            Some(table.id()),
        )
        .unwrap();

        assert_eq!(settlement.sale_ids, vec![first.id, second.id]);
        assert_eq!(merged.total_price, settlement.total);
        assert_eq!(merged.lines.len(), 3);
        assert_eq!(table.availability(), Availability::Available);
        assert!(table.credential().is_none());
        assert!(!table.has_open_tab());
    }

    #[test]
    fn running_total_tracks_every_sale() {
        let issuer = RandomCredentialIssuer;
        let mut table = Table::new(EstablishmentId::new(), "Patio 4").unwrap();
        let mut sales = Vec::new();

        for round in 1..=6u32 {
            let sale = sale_for(&table, &[("Taco", "2.125", round)]);
            table
                .record_sale(sale.id, sale.total_price, &issuer)
                .unwrap();
            sales.push(sale);

            let expected: i64 = sales.iter().map(|s| s.total_price.cents()).sum();
            assert_eq!(table.running_total().cents(), expected);
            assert_eq!(table.open_sales().len(), sales.len());
        }
    }

    #[test]
    fn reserved_table_is_seated_by_a_sale() {
        let issuer = RandomCredentialIssuer;
        let mut table = Table::new(EstablishmentId::new(), "T9").unwrap();
        table.reserve(&issuer).unwrap();
        assert!(table.credential().is_none());

        let sale = sale_for(&table, &[("Water", "1.00", 2)]);
        let change = table
            .record_sale(sale.id, sale.total_price, &issuer)
            .unwrap();

        assert_eq!(change, TabChange::Seated);
        assert_eq!(table.availability(), Availability::Occupied);
        assert!(table.credential().is_some());
    }
}

mod credentials {
    use super::*;

    struct Sequence(std::sync::Mutex<u32>);

    impl CredentialIssuer for Sequence {
        fn issue(&self) -> Credential {
            let mut next = self.0.lock().unwrap();
            *next += 1;
            Credential::new(format!("{:06}", *next), 100_000 + *next)
        }
    }

    #[test]
    fn each_occupancy_gets_a_fresh_credential() {
        let issuer = Sequence(std::sync::Mutex::new(0));
        let mut table = Table::new(EstablishmentId::new(), "Bar 2").unwrap();

        table.occupy(&issuer).unwrap();
        let first = table.credential().cloned().unwrap();
        table.free(&issuer).unwrap();
        table.occupy(&issuer).unwrap();
        let second = table.credential().cloned().unwrap();

        assert_ne!(first, second);
        assert!(second.matches("000002", 100_002));
    }

    #[test]
    fn archived_table_rejects_everything() {
        let issuer = Sequence(std::sync::Mutex::new(0));
        let mut table = Table::new(EstablishmentId::new(), "Old").unwrap();
        assert!(table.archive().unwrap());

        let archived = Err(TableError::Archived(table.id()));
        assert_eq!(table.occupy(&issuer), archived);
        assert_eq!(table.rename("New"), archived);
        assert_eq!(table.credential(), None);
    }
}
