use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db_types::{NewOrder, Order, SyncStatusCount};

/// The order store.
///
/// Every mutating method is a single atomic statement against the backend, so a crash between two calls never leaves
/// a half-written order. Transition methods are conditional: they return `None` when the order is not in a state that
/// allows the transition, and callers treat that as "someone else got there first".
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Create-or-get. Inserts the order unless one with the same payment reference already exists, and returns the
    /// stored row with `true` if this call created it.
    ///
    /// A concurrent writer that wins the race on the payment reference's uniqueness constraint is not an error: the
    /// winner's row is returned with `false`.
    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), OrderStoreError>;

    async fn fetch_order_by_payment_reference(&self, payment_reference: &str)
        -> Result<Option<Order>, OrderStoreError>;

    async fn fetch_order_by_id(&self, id: i64) -> Result<Option<Order>, OrderStoreError>;

    /// `processing` → `completed`, clearing the provisional flag.
    async fn complete_order(&self, payment_reference: &str) -> Result<Option<Order>, OrderStoreError>;

    /// `processing` → `failed`, clearing the provisional flag.
    async fn fail_order(&self, payment_reference: &str) -> Result<Option<Order>, OrderStoreError>;

    /// `completed` or `failed` → `refunded`.
    async fn refund_order(&self, payment_reference: &str) -> Result<Option<Order>, OrderStoreError>;

    /// Increments `sync_attempts` and sets `last_sync_attempt` to `at`. The status is not touched.
    async fn record_sync_attempt(&self, id: i64, at: DateTime<Utc>) -> Result<Order, OrderStoreError>;

    /// All provisional orders, plus `processing` orders whose last sync attempt is missing or older than `cutoff`.
    /// Oldest first.
    async fn fetch_sweep_candidates(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, OrderStoreError>;

    /// Order counts grouped by status and provisional flag.
    async fn sync_statistics(&self) -> Result<Vec<SyncStatusCount>, OrderStoreError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), OrderStoreError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum OrderStoreError {
    #[error("We have an internal database engine (configuration/uptime etc.) error: {0}")]
    DatabaseError(String),
    #[error("The requested order (internal id {0}) does not exist")]
    OrderIdNotFound(i64),
    #[error("Order [{0}] already exists but could not be fetched after a conflicting insert")]
    ConflictingInsert(String),
    #[error("Could not resolve a user account for {0}")]
    UserResolutionError(String),
}

impl From<sqlx::Error> for OrderStoreError {
    fn from(e: sqlx::Error) -> Self {
        OrderStoreError::DatabaseError(e.to_string())
    }
}
