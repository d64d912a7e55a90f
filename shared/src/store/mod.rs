use async_trait::async_trait;
use thiserror::Error;

use crate::record::OrderRecord;

pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("order store unavailable: {0}")]
    Unavailable(String),
    #[error("order store query failed: {0}")]
    Query(#[from] diesel::result::Error),
    #[error("order {order_id} cannot be stored: {reason}")]
    InvalidRecord { order_id: String, reason: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Key-value view of the orders table, keyed by order id.
///
/// `upsert` replaces the whole row and `delete` of a missing key succeeds,
/// so replaying the same write is always safe.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get(&self, order_id: &str) -> StoreResult<Option<OrderRecord>>;
    async fn list(&self, customer_id: Option<&str>) -> StoreResult<Vec<OrderRecord>>;
    async fn upsert(&self, record: OrderRecord) -> StoreResult<()>;
    /// Returns whether a row was removed.
    async fn delete(&self, order_id: &str) -> StoreResult<bool>;
}
