//! Delivery loop around [`OrderProcessor`].
//!
//! A managed queue would redeliver a failed message after a visibility
//! timeout and eventually move it to a poison queue. Kafka does neither, so
//! the worker does it. A failed message waits out the visibility timeout and
//! is republished with a bumped `dequeue-count`; after `max_dequeue_count`
//! deliveries it goes to the poison queue instead. A record is committed only
//! once its message is settled, i.e. processed or safely handed to one of the
//! two queues. Kafka commits whole offsets, so the loop never moves past a
//! record it could not settle.

use futures::StreamExt;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use shared::queue::kafka::delivery_from_message;
use shared::{Delivery, OrderQueue, QueueError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::processor::{OrderProcessor, ProcessOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureRoute {
    Requeue { dequeue_count: u32 },
    Poison,
}

/// Where a message that failed on its `dequeue_count`-th delivery goes next.
pub fn failure_route(dequeue_count: u32, max_dequeue_count: u32) -> FailureRoute {
    if dequeue_count >= max_dequeue_count {
        FailureRoute::Poison
    } else {
        FailureRoute::Requeue { dequeue_count }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_dequeue_count: u32,
    /// Wait before a failed message becomes visible on the queue again.
    pub visibility_timeout: Duration,
    /// Wait between attempts to hand a message back when the queue itself
    /// is failing.
    pub publish_backoff: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    Processed(ProcessOutcome),
    Requeued { dequeue_count: u32 },
    Poisoned { dequeue_count: u32 },
}

pub struct QueueWorker {
    processor: OrderProcessor,
    queue: Arc<dyn OrderQueue>,
    poison_queue: Arc<dyn OrderQueue>,
    policy: RetryPolicy,
}

impl QueueWorker {
    pub fn new(
        processor: OrderProcessor,
        queue: Arc<dyn OrderQueue>,
        poison_queue: Arc<dyn OrderQueue>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            processor,
            queue,
            poison_queue,
            policy,
        }
    }

    pub async fn run(&self, consumer: StreamConsumer) {
        let mut message_stream = consumer.stream();

        while let Some(message) = message_stream.next().await {
            match message {
                Ok(m) => {
                    self.settle(delivery_from_message(&m)).await;
                    if let Err(e) = consumer.commit_message(&m, CommitMode::Async) {
                        error!("Error committing message: {}", e);
                    }
                }
                Err(e) => error!("Error receiving message: {}", e),
            }
        }
    }

    /// Handles `delivery` until it is processed, requeued or poisoned.
    ///
    /// A failed hand-back counts as one more failed delivery and the message
    /// is retried in place.
    pub async fn settle(&self, mut delivery: Delivery) -> DeliveryOutcome {
        loop {
            match self.handle(&delivery).await {
                Ok(outcome) => {
                    info!("Order message {} settled: {:?}", delivery.message_id, outcome);
                    return outcome;
                }
                Err(e) => {
                    error!(
                        "Could not hand order message {} back to a queue, retrying in place: {}",
                        delivery.message_id, e
                    );
                    delivery = delivery.retry(delivery.dequeue_count + 1);
                    tokio::time::sleep(self.policy.publish_backoff).await;
                }
            }
        }
    }

    pub async fn handle(&self, delivery: &Delivery) -> Result<DeliveryOutcome, QueueError> {
        let dequeue_count = delivery.dequeue_count + 1;

        match self.processor.process(&delivery.payload).await {
            Ok(outcome) => Ok(DeliveryOutcome::Processed(outcome)),
            Err(e) => {
                warn!(
                    "Order message {} failed on delivery {}: {}",
                    delivery.message_id, dequeue_count, e
                );
                self.route_failure(delivery, dequeue_count).await
            }
        }
    }

    async fn route_failure(
        &self,
        delivery: &Delivery,
        dequeue_count: u32,
    ) -> Result<DeliveryOutcome, QueueError> {
        match failure_route(dequeue_count, self.policy.max_dequeue_count) {
            FailureRoute::Requeue { dequeue_count } => {
                tokio::time::sleep(self.policy.visibility_timeout).await;
                self.queue.publish(&delivery.retry(dequeue_count)).await?;
                info!(
                    "Requeued order message {} after delivery {}",
                    delivery.message_id, dequeue_count
                );
                Ok(DeliveryOutcome::Requeued { dequeue_count })
            }
            FailureRoute::Poison => {
                self.poison_queue.ensure_exists().await?;
                self.poison_queue
                    .publish(&delivery.retry(dequeue_count))
                    .await?;
                error!(
                    "Order message {} failed {} times, moved to {}",
                    delivery.message_id,
                    dequeue_count,
                    self.poison_queue.name()
                );
                Ok(DeliveryOutcome::Poisoned { dequeue_count })
            }
        }
    }
}
