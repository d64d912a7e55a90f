use chrono::Utc;
use shared::{decode_envelope, OrderAction, OrderMessage, OrderRecord, OrderStore, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    Upserted { order_id: String },
    Deleted { order_id: String, existed: bool },
    Discarded(DiscardReason),
}

/// Why a message was dropped without touching the store. Dropped messages
/// count as processed and are never retried.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscardReason {
    Malformed(String),
    UnknownAction(String),
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("order store failure: {0}")]
    Store(#[from] StoreError),
}

/// Applies queued order messages to the order store.
#[derive(Clone)]
pub struct OrderProcessor {
    store: Arc<dyn OrderStore>,
}

impl OrderProcessor {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    pub async fn process(&self, payload: &[u8]) -> Result<ProcessOutcome, ProcessError> {
        match decode_envelope(payload) {
            Ok(message) => self.apply(message).await,
            Err(e) => {
                warn!("Discarding malformed order message: {}", e);
                Ok(ProcessOutcome::Discarded(DiscardReason::Malformed(
                    e.to_string(),
                )))
            }
        }
    }

    pub async fn apply(&self, message: OrderMessage) -> Result<ProcessOutcome, ProcessError> {
        let outcome = match message.action {
            OrderAction::CreateOrUpdate => self.create_or_update(message).await,
            OrderAction::Delete => self.delete(message.order_id).await,
            OrderAction::Other(action) => {
                warn!(
                    "Unknown action {:?} for order {}, ignoring",
                    action, message.order_id
                );
                return Ok(ProcessOutcome::Discarded(DiscardReason::UnknownAction(
                    action,
                )));
            }
        };

        outcome.map_err(|e| {
            error!("Error processing order message: {}", e);
            ProcessError::Store(e)
        })
    }

    async fn create_or_update(&self, message: OrderMessage) -> Result<ProcessOutcome, StoreError> {
        let order_id = message.order_id.clone();
        let record = match OrderRecord::from_message(message, Utc::now()) {
            Ok(record) => record,
            Err(e) => {
                warn!("Discarding order message for {}: {}", order_id, e);
                return Ok(ProcessOutcome::Discarded(DiscardReason::Malformed(
                    e.to_string(),
                )));
            }
        };

        self.store.upsert(record).await?;
        info!("Order {} created or updated", order_id);

        Ok(ProcessOutcome::Upserted { order_id })
    }

    async fn delete(&self, order_id: String) -> Result<ProcessOutcome, StoreError> {
        let existed = self.store.delete(&order_id).await?;
        if existed {
            info!("Order {} deleted", order_id);
        } else {
            info!("Order {} already absent, nothing to delete", order_id);
        }

        Ok(ProcessOutcome::Deleted { order_id, existed })
    }
}
