//! HTTP handlers, grouped by resource.

pub mod access;
pub mod catalog;
pub mod deliveries;
pub mod establishments;
pub mod ops;
pub mod orders;
pub mod sales;
pub mod tables;

use std::str::FromStr;
use std::sync::Arc;

use domain::{CredentialIssuer, RandomCredentialIssuer};
use ordering::{CatalogService, EstablishmentService, OrderWorkflow, RetryPolicy};
use store::Store;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub workflow: Arc<OrderWorkflow<S>>,
    pub catalog: CatalogService<S>,
    pub establishments: EstablishmentService<S>,
}

impl<S: Store + Clone> AppState<S> {
    /// Builds the services over one store with random credentials.
    pub fn new(store: S, retry: RetryPolicy) -> Self {
        Self::with_issuer(store, Arc::new(RandomCredentialIssuer), retry)
    }

    pub fn with_issuer(store: S, issuer: Arc<dyn CredentialIssuer>, retry: RetryPolicy) -> Self {
        Self {
            catalog: CatalogService::new(store.clone()),
            establishments: EstablishmentService::new(store.clone()),
            workflow: Arc::new(OrderWorkflow::new(store, issuer, retry)),
        }
    }
}

/// Parses a path segment into an identifier.
fn parse_id<T: FromStr>(entity: &str, raw: &str) -> Result<T, ApiError>
where
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid {entity} ID format: {e}")))
}
