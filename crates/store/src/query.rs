use chrono::{DateTime, NaiveDate, Utc};
use common::{EstablishmentId, TableId};
use domain::Sale;

/// Builder for constructing sale queries.
///
/// Archived sales are never returned. Results are ordered by creation time,
/// oldest first.
#[derive(Debug, Clone)]
pub struct SaleQuery {
    /// Establishment whose sales are listed.
    pub establishment_id: EstablishmentId,

    /// Only return sales not yet completed.
    pub incomplete_only: bool,

    /// Filter by table.
    pub table_id: Option<TableId>,

    /// Filter by sales created at or after this timestamp.
    pub from_timestamp: Option<DateTime<Utc>>,

    /// Filter by sales created before this timestamp (exclusive).
    pub to_timestamp: Option<DateTime<Utc>>,

    /// Maximum number of sales to return.
    pub limit: Option<usize>,
}

impl SaleQuery {
    /// Creates a query for every active sale of an establishment.
    pub fn for_establishment(establishment_id: EstablishmentId) -> Self {
        Self {
            establishment_id,
            incomplete_only: false,
            table_id: None,
            from_timestamp: None,
            to_timestamp: None,
            limit: None,
        }
    }

    /// Restricts the query to sales not yet completed.
    pub fn incomplete(mut self) -> Self {
        self.incomplete_only = true;
        self
    }

    /// Filters by table.
    pub fn table(mut self, table_id: TableId) -> Self {
        self.table_id = Some(table_id);
        self
    }

    /// Filters to sales created at or after this timestamp.
    pub fn from_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.from_timestamp = Some(timestamp);
        self
    }

    /// Filters to sales created before this timestamp.
    pub fn to_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.to_timestamp = Some(timestamp);
        self
    }

    /// Filters to sales created on the given UTC day.
    pub fn on_day(self, day: NaiveDate) -> Self {
        let start = day.and_hms_opt(0, 0, 0).map(|t| t.and_utc());
        let end = day
            .succ_opt()
            .and_then(|next| next.and_hms_opt(0, 0, 0))
            .map(|t| t.and_utc());
        Self {
            from_timestamp: start,
            to_timestamp: end,
            ..self
        }
    }

    /// Limits the number of sales returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns true if `sale` satisfies every filter.
    pub fn matches(&self, sale: &Sale) -> bool {
        if sale.archived || sale.establishment_id != self.establishment_id {
            return false;
        }
        if self.incomplete_only && sale.completed {
            return false;
        }
        if let Some(table_id) = self.table_id
            && sale.table_id != Some(table_id)
        {
            return false;
        }
        if let Some(from) = self.from_timestamp
            && sale.created_at < from
        {
            return false;
        }
        if let Some(to) = self.to_timestamp
            && sale.created_at >= to
        {
            return false;
        }
        true
    }
}
