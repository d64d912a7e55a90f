//! In-memory [`OrderStore`] for local runs and tests.
//!
//! Not durable. Rows live in a `BTreeMap` so listings come back in order id
//! order, matching the Postgres store.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use super::{OrderStore, StoreError, StoreResult};
use crate::record::OrderRecord;

#[derive(Default)]
pub struct MemoryOrderStore {
    orders: RwLock<BTreeMap<String, OrderRecord>>,
    unavailable: AtomicBool,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every call fails with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }

    fn check(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn get(&self, order_id: &str) -> StoreResult<Option<OrderRecord>> {
        self.check()?;
        Ok(self.orders.read().await.get(order_id).cloned())
    }

    async fn list(&self, customer_id: Option<&str>) -> StoreResult<Vec<OrderRecord>> {
        self.check()?;
        let orders = self.orders.read().await;
        Ok(orders
            .values()
            .filter(|record| customer_id.map_or(true, |id| record.customer_id == id))
            .cloned()
            .collect())
    }

    async fn upsert(&self, record: OrderRecord) -> StoreResult<()> {
        self.check()?;
        self.orders
            .write()
            .await
            .insert(record.order_id.clone(), record);
        Ok(())
    }

    async fn delete(&self, order_id: &str) -> StoreResult<bool> {
        self.check()?;
        Ok(self.orders.write().await.remove(order_id).is_some())
    }
}
