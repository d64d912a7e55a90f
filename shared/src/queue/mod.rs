use async_trait::async_trait;
use rdkafka::error::KafkaError;
use thiserror::Error;
use uuid::Uuid;

pub mod kafka;
pub mod memory;

pub const MESSAGE_ID_HEADER: &str = "message-id";
pub const DEQUEUE_COUNT_HEADER: &str = "dequeue-count";

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("kafka error: {0}")]
    Kafka(#[from] KafkaError),
    #[error("failed to create queue {queue}: {reason}")]
    CreateFailed { queue: String, reason: String },
    #[error("queue {0} is unavailable")]
    Unavailable(String),
}

pub type QueueResult<T> = Result<T, QueueError>;

/// One message on the queue, together with the deliveries it has
/// already failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub message_id: String,
    pub payload: Vec<u8>,
    pub dequeue_count: u32,
}

impl Delivery {
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            payload,
            dequeue_count: 0,
        }
    }

    /// The same message, handed back after `dequeue_count` failed deliveries.
    pub fn retry(&self, dequeue_count: u32) -> Self {
        Self {
            dequeue_count,
            ..self.clone()
        }
    }
}

/// Durable queue the order messages travel through.
#[async_trait]
pub trait OrderQueue: Send + Sync {
    fn name(&self) -> &str;
    /// Creates the queue if it does not exist yet. Safe to call repeatedly.
    async fn ensure_exists(&self) -> QueueResult<()>;
    async fn publish(&self, delivery: &Delivery) -> QueueResult<()>;
}
