//! Collaborator seams for the routing core.
//!
//! The core never talks to a network, a disk or a wall clock directly.
//! Hosts implement these for their own infrastructure; the crate ships
//! small implementations in `storage`, `clock` and `osrm`.

use serde_json::Value;
use thiserror::Error;

use crate::batch::OrderRoute;
use crate::geo_key::{Coordinate, RoutingPolicy};
use crate::storage::StorageError;

/// External routing provider.
///
/// Returns the provider's raw response. Only the shape understood by
/// `normalize` is relied upon; anything else is treated as unusable data.
pub trait RoutingProvider {
    fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        waypoints: &[Coordinate],
        policy: &RoutingPolicy,
    ) -> Result<Value, RoutingError>;
}

/// Failure of a single routing call. Never retried by the core.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("routing request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("routing provider returned status {0}")]
    Status(String),
    #[error("routing provider returned no routes")]
    NoRoute,
}

/// Durable named string slot (browser-storage style).
pub trait KeyValueSlot {
    fn load(&self, name: &str) -> Result<Option<String>, StorageError>;

    /// Fails with [`StorageError::QuotaExceeded`] when the value does not fit.
    fn save(&mut self, name: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&mut self, name: &str) -> Result<(), StorageError>;
}

/// Resolves an order identifier to its station pair.
///
/// Lookups run in parallel, hence `Sync`.
pub trait OrderLookup: Sync {
    fn order_by_id(&self, order_id: &str) -> Option<OrderRoute>;
}

/// Millisecond epoch time source.
pub trait Clock {
    fn now_millis(&self) -> i64;
}
