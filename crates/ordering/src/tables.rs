//! Table tab manager: the table state machine over compare-and-swap writes.

use std::sync::Arc;

use common::{EstablishmentId, TableId};
use domain::{Availability, CredentialIssuer, Sale, TabChange, Table};
use store::{ArchiveOutcome, SaleMerge, Store, StoreError, TableUpdate};

use crate::error::{OrderingError, Result};
use crate::retry::RetryPolicy;
use crate::sales::SaleRecorder;

/// Credentials issued for one write before giving up on a unique token.
pub const CREDENTIAL_ATTEMPTS: u32 = 5;

/// A table after a state change, with the sale its tab settled into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableTransition {
    pub table: Table,
    pub settled: Option<Sale>,
}

/// Owns tables and their running tabs.
///
/// Every change reads the table, applies the transition to that copy and
/// writes it back only if nobody else wrote in between. A lost race is
/// recomputed from a fresh read under the retry policy.
#[derive(Clone)]
pub struct TableTabManager<S: Store> {
    store: S,
    sales: SaleRecorder<S>,
    issuer: Arc<dyn CredentialIssuer>,
    retry: RetryPolicy,
}

impl<S: Store + Clone> TableTabManager<S> {
    pub fn new(store: S, issuer: Arc<dyn CredentialIssuer>, retry: RetryPolicy) -> Self {
        Self {
            sales: SaleRecorder::new(store.clone()),
            store,
            issuer,
            retry,
        }
    }

    /// Creates an available table.
    #[tracing::instrument(skip(self))]
    pub async fn create(&self, establishment_id: EstablishmentId, name: &str) -> Result<Table> {
        let table = Table::new(establishment_id, name)?;
        self.store.insert_table(table.clone()).await?;
        tracing::info!(table_id = %table.id(), "table created");
        Ok(table)
    }

    pub async fn list(&self, establishment_id: EstablishmentId) -> Result<Vec<Table>> {
        Ok(self.store.list_tables(establishment_id).await?)
    }

    /// Returns an active table.
    pub async fn get(&self, establishment_id: EstablishmentId, table_id: TableId) -> Result<Table> {
        self.store
            .find_table(establishment_id, table_id)
            .await?
            .filter(|table| !table.is_archived())
            .ok_or_else(|| OrderingError::not_found("Table", table_id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn rename(
        &self,
        establishment_id: EstablishmentId,
        table_id: TableId,
        name: &str,
    ) -> Result<Table> {
        self.retry
            .run("rename_table", move || async move {
                let mut table = self.get(establishment_id, table_id).await?;
                table.rename(name)?;
                self.write(table, None).await
            })
            .await
    }

    /// Archives a table that holds no tab. Archiving twice is a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn archive(
        &self,
        establishment_id: EstablishmentId,
        table_id: TableId,
    ) -> Result<ArchiveOutcome> {
        self.retry
            .run("archive_table", move || async move {
                let Some(mut table) = self.store.find_table(establishment_id, table_id).await?
                else {
                    return Err(OrderingError::not_found("Table", table_id));
                };
                if !table.archive()? {
                    return Ok(ArchiveOutcome::AlreadyArchived);
                }
                self.write(table, None).await?;
                tracing::info!("table archived");
                Ok(ArchiveOutcome::Archived)
            })
            .await
    }

    /// Adds a recorded sale to the table's tab.
    ///
    /// An available table opens a tab, a reserved one is seated, and an
    /// occupied one appends. The first two issue a fresh credential.
    #[tracing::instrument(skip(self, sale), fields(sale_id = %sale.id))]
    pub async fn record_sale(
        &self,
        establishment_id: EstablishmentId,
        table_id: TableId,
        sale: &Sale,
    ) -> Result<(Table, TabChange)> {
        self.retry
            .run("record_table_sale", move || async move {
                let mut table = self.get(establishment_id, table_id).await?;
                let change = table.record_sale(sale.id, sale.total_price, self.issuer.as_ref())?;
                let table = self.write(table, None).await?;
                tracing::info!(change = change.as_str(), running_total = %table.running_total(), "tab updated");
                Ok((table, change))
            })
            .await
    }

    /// Moves a table to `target`.
    ///
    /// Reaching `Available` with an open tab merges its sales into one
    /// completed sale, committed together with the table reset.
    #[tracing::instrument(skip(self))]
    pub async fn transition(
        &self,
        establishment_id: EstablishmentId,
        table_id: TableId,
        target: Availability,
    ) -> Result<TableTransition> {
        self.retry
            .run("transition_table", move || async move {
                let mut table = self.get(establishment_id, table_id).await?;
                let from = table.availability();
                let merge = match table.transition(target, self.issuer.as_ref())? {
                    Some(settlement) => Some(
                        self.sales
                            .prepare_merge(
                                establishment_id,
                                &settlement.sale_ids,
                                &settlement.description,
                                settlement.total,
                                Some(table_id),
                            )
                            .await?,
                    ),
                    None => None,
                };

                let settled = merge.as_ref().map(|merge| merge.merged.clone());
                let table = self.write(table, merge).await?;
                if let Some(sale) = &settled {
                    metrics::counter!("table_settlements_total").increment(1);
                    tracing::info!(sale_id = %sale.id, total = %sale.total_price, "tab settled");
                }
                tracing::info!(%from, to = %target, "table transitioned");
                Ok(TableTransition { table, settled })
            })
            .await
    }

    /// Seats customers without a sale.
    pub async fn occupy(
        &self,
        establishment_id: EstablishmentId,
        table_id: TableId,
    ) -> Result<TableTransition> {
        self.transition(establishment_id, table_id, Availability::Occupied)
            .await
    }

    /// Holds the table, keeping any open tab.
    pub async fn reserve(
        &self,
        establishment_id: EstablishmentId,
        table_id: TableId,
    ) -> Result<TableTransition> {
        self.transition(establishment_id, table_id, Availability::Reserved)
            .await
    }

    /// Vacates the table and settles its tab.
    pub async fn free(
        &self,
        establishment_id: EstablishmentId,
        table_id: TableId,
    ) -> Result<TableTransition> {
        self.transition(establishment_id, table_id, Availability::Available)
            .await
    }

    /// Finds the occupied table holding exactly this credential.
    #[tracing::instrument(skip(self, passcode))]
    pub async fn resolve(&self, token: &str, passcode: u32) -> Result<Table> {
        self.store
            .find_table_by_credential(token, passcode)
            .await?
            .filter(|table| table.availability() == Availability::Occupied)
            .ok_or_else(|| OrderingError::not_found("Table", token))
    }

    /// Writes `table` at the version it was read, re-issuing its credential
    /// while the store reports the token as taken.
    async fn write(&self, mut table: Table, merge: Option<SaleMerge>) -> Result<Table> {
        for attempt in 1..=CREDENTIAL_ATTEMPTS {
            let update = TableUpdate {
                table: table.clone(),
                merge: merge.clone(),
            };
            match self.store.update_table(update).await {
                Ok(written) => return Ok(written),
                Err(StoreError::TokenTaken { table_id }) => {
                    metrics::counter!("credential_collisions_total").increment(1);
                    tracing::warn!(%table_id, attempt, "credential token taken, issuing another");
                    table.reissue_credential(self.issuer.as_ref());
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(OrderingError::StorageUnavailable(format!(
            "no unique credential after {CREDENTIAL_ATTEMPTS} attempts"
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use common::ItemId;
    use domain::{
        Credential, Establishment, Money, PriceLine, RandomCredentialIssuer, UnitPrice, price,
    };
    use store::InMemoryStore;

    use super::*;

    /// Hands out the queued tokens, then random ones.
    struct QueuedIssuer(Mutex<Vec<&'static str>>);

    impl CredentialIssuer for QueuedIssuer {
        fn issue(&self) -> Credential {
            let mut queue = self.0.lock().unwrap();
            if queue.is_empty() {
                return RandomCredentialIssuer.issue();
            }
            Credential::new(queue.remove(0), 123_456)
        }
    }

    async fn setup(
        issuer: Arc<dyn CredentialIssuer>,
    ) -> (TableTabManager<InMemoryStore>, SaleRecorder<InMemoryStore>, EstablishmentId) {
        let store = InMemoryStore::new();
        let establishment = Establishment::new("Diner", "1 Main St").unwrap();
        let establishment_id = establishment.id;
        store.insert_establishment(establishment).await.unwrap();
        (
            TableTabManager::new(store.clone(), issuer, RetryPolicy::default()),
            SaleRecorder::new(store),
            establishment_id,
        )
    }

    async fn sale(recorder: &SaleRecorder<InMemoryStore>, est: EstablishmentId, cents: i64) -> Sale {
        let priced = price(&[PriceLine::new(ItemId::new(), "Item", UnitPrice::from_cents(cents), 1)])
            .unwrap();
        recorder
            .record(est, &priced, "T1", None, false, None)
            .await
            .unwrap()
            .0
    }

    #[tokio::test]
    async fn test_tab_opens_appends_and_settles() {
        let (tables, recorder, est) = setup(Arc::new(RandomCredentialIssuer)).await;
        let table = tables.create(est, "T1").await.unwrap();
        let first = sale(&recorder, est, 1_000).await;
        let second = sale(&recorder, est, 250).await;

        let (opened, change) = tables.record_sale(est, table.id(), &first).await.unwrap();
        assert_eq!(change, TabChange::Opened);
        let token = opened.credential().unwrap().token().to_string();

        let (appended, change) = tables.record_sale(est, table.id(), &second).await.unwrap();
        assert_eq!(change, TabChange::Appended);
        assert_eq!(appended.credential().unwrap().token(), token);
        assert_eq!(appended.running_total(), Money::from_cents(1_250));

        let freed = tables.free(est, table.id()).await.unwrap();
        let settled = freed.settled.unwrap();
        assert_eq!(settled.total_price, Money::from_cents(1_250));
        assert_eq!(settled.table_id, Some(table.id()));
        assert_eq!(settled.description, "T1");
        assert_eq!(freed.table.availability(), Availability::Available);
        assert!(freed.table.running_total().is_zero());
        assert!(freed.table.credential().is_none());

        let err = recorder.get(est, first.id).await.unwrap_err();
        assert!(matches!(err, OrderingError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_same_state_transition_is_rejected() {
        let (tables, _, est) = setup(Arc::new(RandomCredentialIssuer)).await;
        let table = tables.create(est, "T1").await.unwrap();

        let err = tables.free(est, table.id()).await.unwrap_err();
        assert!(matches!(err, OrderingError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_taken_token_is_reissued() {
        let issuer = QueuedIssuer(Mutex::new(vec!["aaaaaa", "aaaaaa", "bbbbbb"]));
        let (tables, _, est) = setup(Arc::new(issuer)).await;
        let first = tables.create(est, "T1").await.unwrap();
        let second = tables.create(est, "T2").await.unwrap();

        let first = tables.occupy(est, first.id()).await.unwrap().table;
        let second = tables.occupy(est, second.id()).await.unwrap().table;

        assert_eq!(first.credential().unwrap().token(), "aaaaaa");
        assert_eq!(second.credential().unwrap().token(), "bbbbbb");
    }

    #[tokio::test]
    async fn test_token_collisions_are_bounded() {
        let issuer = QueuedIssuer(Mutex::new(vec!["aaaaaa"; 10]));
        let (tables, _, est) = setup(Arc::new(issuer)).await;
        let first = tables.create(est, "T1").await.unwrap();
        let second = tables.create(est, "T2").await.unwrap();

        tables.occupy(est, first.id()).await.unwrap();
        let err = tables.occupy(est, second.id()).await.unwrap_err();
        assert!(matches!(err, OrderingError::StorageUnavailable(_)));
    }

    #[tokio::test]
    async fn test_resolve_requires_exact_credential() {
        let issuer = QueuedIssuer(Mutex::new(vec!["cafe01"]));
        let (tables, _, est) = setup(Arc::new(issuer)).await;
        let table = tables.create(est, "T1").await.unwrap();
        tables.occupy(est, table.id()).await.unwrap();

        let resolved = tables.resolve("cafe01", 123_456).await.unwrap();
        assert_eq!(resolved.id(), table.id());
        assert!(tables.resolve("cafe01", 654_321).await.is_err());

        tables.free(est, table.id()).await.unwrap();
        assert!(tables.resolve("cafe01", 123_456).await.is_err());
    }

    #[tokio::test]
    async fn test_archive_requires_empty_tab() {
        let (tables, recorder, est) = setup(Arc::new(RandomCredentialIssuer)).await;
        let table = tables.create(est, "T1").await.unwrap();
        let open = sale(&recorder, est, 500).await;
        tables.record_sale(est, table.id(), &open).await.unwrap();

        let err = tables.archive(est, table.id()).await.unwrap_err();
        assert!(matches!(err, OrderingError::InvalidTransition { .. }));

        tables.free(est, table.id()).await.unwrap();
        assert_eq!(
            tables.archive(est, table.id()).await.unwrap(),
            ArchiveOutcome::Archived
        );
        assert_eq!(
            tables.archive(est, table.id()).await.unwrap(),
            ArchiveOutcome::AlreadyArchived
        );
        assert!(tables.get(est, table.id()).await.is_err());
    }
}
