//! Table record and tab bookkeeping.

use chrono::{DateTime, Utc};
use common::{EstablishmentId, SaleId, TableId, Version};
use serde::{Deserialize, Serialize};

use super::{Availability, TableError};
use crate::credential::{Credential, CredentialIssuer};
use crate::money::Money;

/// What a sale did to a table's tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TabChange {
    /// The table was available; a tab was opened and a credential issued.
    Opened,
    /// The sale joined the tab of an occupied table.
    Appended,
    /// The table was reserved; it is now occupied and the sale joined any held tab.
    Seated,
}

impl TabChange {
    /// Returns the change name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            TabChange::Opened => "opened",
            TabChange::Appended => "appended",
            TabChange::Seated => "seated",
        }
    }

    /// Returns true if this change issued a new credential.
    pub fn issued_credential(&self) -> bool {
        !matches!(self, TabChange::Appended)
    }
}

/// A tab closed by moving a table to `Available`.
///
/// The caller merges `sale_ids` into one sale described by `description`
/// whose total must equal `total`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub sale_ids: Vec<SaleId>,
    pub total: Money,
    pub description: String,
}

/// Raw table fields, as read back from storage.
#[derive(Debug, Clone)]
pub struct TableParts {
    pub id: TableId,
    pub establishment_id: EstablishmentId,
    pub name: String,
    pub availability: Availability,
    pub credential: Option<Credential>,
    pub open_sales: Vec<SaleId>,
    pub running_total: Money,
    pub archived: bool,
    pub version: Version,
    pub created_at: DateTime<Utc>,
}

/// A physical table and its running tab.
///
/// A credential is present exactly when the table is `Occupied`, and the
/// running total is the sum of the open sales' totals. Both hold after
/// every method that returns `Ok`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    id: TableId,
    establishment_id: EstablishmentId,
    name: String,
    availability: Availability,
    #[serde(skip_serializing_if = "Option::is_none")]
    credential: Option<Credential>,
    open_sales: Vec<SaleId>,
    running_total: Money,
    archived: bool,
    version: Version,
    created_at: DateTime<Utc>,
}

fn valid_name(name: &str) -> Result<String, TableError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(TableError::InvalidName);
    }
    Ok(trimmed.to_string())
}

impl Table {
    /// Creates a new available table.
    pub fn new(establishment_id: EstablishmentId, name: &str) -> Result<Self, TableError> {
        Ok(Self {
            id: TableId::new(),
            establishment_id,
            name: valid_name(name)?,
            availability: Availability::Available,
            credential: None,
            open_sales: Vec::new(),
            running_total: Money::zero(),
            archived: false,
            version: Version::first(),
            created_at: Utc::now(),
        })
    }

    /// Rebuilds a table from stored fields.
    pub fn restore(parts: TableParts) -> Self {
        Self {
            id: parts.id,
            establishment_id: parts.establishment_id,
            name: parts.name,
            availability: parts.availability,
            credential: parts.credential,
            open_sales: parts.open_sales,
            running_total: parts.running_total,
            archived: parts.archived,
            version: parts.version,
            created_at: parts.created_at,
        }
    }

    pub fn id(&self) -> TableId {
        self.id
    }

    pub fn establishment_id(&self) -> EstablishmentId {
        self.establishment_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn availability(&self) -> Availability {
        self.availability
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Returns the open sales in the order they joined the tab.
    pub fn open_sales(&self) -> &[SaleId] {
        &self.open_sales
    }

    pub fn running_total(&self) -> Money {
        self.running_total
    }

    pub fn is_archived(&self) -> bool {
        self.archived
    }

    /// Returns the version this copy was read at.
    pub fn version(&self) -> Version {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns true if the table holds a non-empty tab.
    pub fn has_open_tab(&self) -> bool {
        !self.open_sales.is_empty()
    }

    /// Marks this copy as written once more. Stores call this after a
    /// successful compare-and-swap.
    pub fn advance_version(&mut self) {
        self.version = self.version.next();
    }

    fn ensure_active(&self) -> Result<(), TableError> {
        if self.archived {
            return Err(TableError::Archived(self.id));
        }
        Ok(())
    }

    /// Adds a sale to the tab, seating the table if needed.
    pub fn record_sale(
        &mut self,
        sale_id: SaleId,
        total: Money,
        issuer: &dyn CredentialIssuer,
    ) -> Result<TabChange, TableError> {
        self.ensure_active()?;
        let running_total = self
            .running_total
            .checked_add(total)
            .ok_or(TableError::Overflow)?;

        let change = match self.availability {
            Availability::Available => TabChange::Opened,
            Availability::Occupied => TabChange::Appended,
            Availability::Reserved => TabChange::Seated,
        };
        if change.issued_credential() {
            self.availability = Availability::Occupied;
            self.credential = Some(issuer.issue());
        }
        self.open_sales.push(sale_id);
        self.running_total = running_total;
        Ok(change)
    }

    /// Moves the table to `target`.
    ///
    /// Moving to `Available` closes the tab and returns the settlement when
    /// it held any sales.
    pub fn transition(
        &mut self,
        target: Availability,
        issuer: &dyn CredentialIssuer,
    ) -> Result<Option<Settlement>, TableError> {
        self.ensure_active()?;
        if !self.availability.can_transition_to(target) {
            return Err(TableError::InvalidTransition {
                from: self.availability,
                to: target,
            });
        }

        self.availability = target;
        match target {
            Availability::Occupied => {
                self.credential = Some(issuer.issue());
                Ok(None)
            }
            Availability::Reserved => {
                self.credential = None;
                Ok(None)
            }
            Availability::Available => {
                self.credential = None;
                let sale_ids = std::mem::take(&mut self.open_sales);
                let total = std::mem::take(&mut self.running_total);
                if sale_ids.is_empty() {
                    return Ok(None);
                }
                Ok(Some(Settlement {
                    sale_ids,
                    total,
                    description: self.name.clone(),
                }))
            }
        }
    }

    /// Seats customers without a sale.
    pub fn occupy(&mut self, issuer: &dyn CredentialIssuer) -> Result<(), TableError> {
        self.transition(Availability::Occupied, issuer).map(|_| ())
    }

    /// Holds the table, keeping any open tab.
    pub fn reserve(&mut self, issuer: &dyn CredentialIssuer) -> Result<(), TableError> {
        self.transition(Availability::Reserved, issuer).map(|_| ())
    }

    /// Vacates the table, settling the tab.
    pub fn free(&mut self, issuer: &dyn CredentialIssuer) -> Result<Option<Settlement>, TableError> {
        self.transition(Availability::Available, issuer)
    }

    /// Replaces the credential of an occupied table.
    ///
    /// Used when the store reports the freshly issued token as taken.
    pub fn reissue_credential(&mut self, issuer: &dyn CredentialIssuer) {
        if self.availability.has_credential() {
            self.credential = Some(issuer.issue());
        }
    }

    /// Changes the display name.
    pub fn rename(&mut self, name: &str) -> Result<(), TableError> {
        self.ensure_active()?;
        self.name = valid_name(name)?;
        Ok(())
    }

    /// Archives the table. Returns false if it was already archived.
    pub fn archive(&mut self) -> Result<bool, TableError> {
        if self.archived {
            return Ok(false);
        }
        if !self.availability.can_archive() || self.has_open_tab() {
            return Err(TableError::TabOpen {
                availability: self.availability,
                open_sales: self.open_sales.len(),
            });
        }
        self.archived = true;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedIssuer;

    impl CredentialIssuer for FixedIssuer {
        fn issue(&self) -> Credential {
            Credential::new("abc123", 424_242)
        }
    }

    fn table() -> Table {
        Table::new(EstablishmentId::new(), "T1").unwrap()
    }

    #[test]
    fn test_new_table_is_available() {
        let table = table();
        assert_eq!(table.availability(), Availability::Available);
        assert!(table.credential().is_none());
        assert!(table.open_sales().is_empty());
        assert!(table.running_total().is_zero());
        assert_eq!(table.version(), Version::first());
    }

    #[test]
    fn test_blank_name_rejected() {
        assert_eq!(
            Table::new(EstablishmentId::new(), "  ").unwrap_err(),
            TableError::InvalidName
        );
    }

    #[test]
    fn test_first_sale_opens_tab() {
        let mut table = table();
        let sale = SaleId::new();
        let change = table
            .record_sale(sale, Money::from_cents(1975), &FixedIssuer)
            .unwrap();

        assert_eq!(change, TabChange::Opened);
        assert_eq!(table.availability(), Availability::Occupied);
        assert_eq!(table.credential().unwrap().token(), "abc123");
        assert_eq!(table.open_sales(), &[sale]);
        assert_eq!(table.running_total().cents(), 1975);
    }

    #[test]
    fn test_later_sale_appends_without_new_credential() {
        let mut table = table();
        table
            .record_sale(SaleId::new(), Money::from_cents(1000), &OtherIssuer)
            .unwrap();
        let before = table.credential().cloned();

        let change = table
            .record_sale(SaleId::new(), Money::from_cents(500), &FixedIssuer)
            .unwrap();

        assert_eq!(change, TabChange::Appended);
        assert_eq!(table.credential().cloned(), before);
        assert_eq!(table.open_sales().len(), 2);
        assert_eq!(table.running_total().cents(), 1500);
    }

    #[test]
    fn test_free_settles_tab() {
        let mut table = table();
        let first = SaleId::new();
        let second = SaleId::new();
        table
            .record_sale(first, Money::from_cents(1975), &FixedIssuer)
            .unwrap();
        table
            .record_sale(second, Money::from_cents(250), &FixedIssuer)
            .unwrap();

        let settlement = table.free(&FixedIssuer).unwrap().unwrap();

        assert_eq!(settlement.sale_ids, vec![first, second]);
        assert_eq!(settlement.total.cents(), 2225);
        assert_eq!(settlement.description, "T1");
        assert_eq!(table.availability(), Availability::Available);
        assert!(table.credential().is_none());
        assert!(table.open_sales().is_empty());
        assert!(table.running_total().is_zero());
    }

    #[test]
    fn test_free_without_tab_has_no_settlement() {
        let mut table = table();
        table.occupy(&FixedIssuer).unwrap();
        assert!(table.free(&FixedIssuer).unwrap().is_none());
        assert_eq!(table.availability(), Availability::Available);
    }

    #[test]
    fn test_reserve_holds_tab_and_clears_credential() {
        let mut table = table();
        table
            .record_sale(SaleId::new(), Money::from_cents(800), &FixedIssuer)
            .unwrap();
        table.reserve(&FixedIssuer).unwrap();

        assert_eq!(table.availability(), Availability::Reserved);
        assert!(table.credential().is_none());
        assert_eq!(table.open_sales().len(), 1);
        assert_eq!(table.running_total().cents(), 800);

        let change = table
            .record_sale(SaleId::new(), Money::from_cents(200), &FixedIssuer)
            .unwrap();
        assert_eq!(change, TabChange::Seated);
        assert_eq!(table.availability(), Availability::Occupied);
        assert!(table.credential().is_some());
        assert_eq!(table.running_total().cents(), 1000);
    }

    #[test]
    fn test_same_state_transition_rejected() {
        let mut table = table();
        assert_eq!(
            table.free(&FixedIssuer).unwrap_err(),
            TableError::InvalidTransition {
                from: Availability::Available,
                to: Availability::Available,
            }
        );
        table.occupy(&FixedIssuer).unwrap();
        assert!(matches!(
            table.occupy(&FixedIssuer),
            Err(TableError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_archive_rules() {
        let mut table = table();
        table
            .record_sale(SaleId::new(), Money::from_cents(100), &FixedIssuer)
            .unwrap();
        assert!(matches!(table.archive(), Err(TableError::TabOpen { .. })));

        table.reserve(&FixedIssuer).unwrap();
        assert!(matches!(table.archive(), Err(TableError::TabOpen { .. })));

        table.free(&FixedIssuer).unwrap();
        assert!(table.archive().unwrap());
        assert!(!table.archive().unwrap());
        assert_eq!(
            table.record_sale(SaleId::new(), Money::from_cents(1), &FixedIssuer),
            Err(TableError::Archived(table.id()))
        );
    }

    #[test]
    fn test_reissue_only_when_occupied() {
        let mut table = table();
        table.reissue_credential(&FixedIssuer);
        assert!(table.credential().is_none());

        table.occupy(&OtherIssuer).unwrap();
        table.reissue_credential(&FixedIssuer);
        assert_eq!(table.credential().unwrap().token(), "abc123");
    }

    struct OtherIssuer;

    impl CredentialIssuer for OtherIssuer {
        fn issue(&self) -> Credential {
            Credential::new("zzz999", 111_111)
        }
    }
}
