//! Establishments, the scope of every other record.

use common::EstablishmentId;
use domain::Establishment;
use store::{ArchiveOutcome, Store};

use crate::error::{OrderingError, Result};

/// Returns the establishment if it exists and is active.
pub(crate) async fn active_establishment<S: Store>(
    store: &S,
    establishment_id: EstablishmentId,
) -> Result<Establishment> {
    store
        .find_establishment(establishment_id)
        .await?
        .filter(|establishment| !establishment.archived)
        .ok_or(OrderingError::EstablishmentNotFound(establishment_id))
}

#[derive(Clone)]
pub struct EstablishmentService<S: Store> {
    store: S,
}

impl<S: Store> EstablishmentService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self))]
    pub async fn create(&self, name: &str, address: &str) -> Result<Establishment> {
        let establishment = Establishment::new(name, address)?;
        self.store
            .insert_establishment(establishment.clone())
            .await?;
        tracing::info!(establishment_id = %establishment.id, "establishment created");
        Ok(establishment)
    }

    pub async fn get(&self, establishment_id: EstablishmentId) -> Result<Establishment> {
        active_establishment(&self.store, establishment_id).await
    }

    /// Archives an establishment. Archiving twice is a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn archive(&self, establishment_id: EstablishmentId) -> Result<ArchiveOutcome> {
        match self.store.archive_establishment(establishment_id).await? {
            ArchiveOutcome::Missing => Err(OrderingError::EstablishmentNotFound(establishment_id)),
            outcome => Ok(outcome),
        }
    }
}
