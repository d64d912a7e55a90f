use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::Mutex;

use super::{Delivery, OrderQueue, QueueError, QueueResult};

/// FIFO queue held in process memory.
pub struct MemoryQueue {
    name: String,
    deliveries: Mutex<VecDeque<Delivery>>,
    created: AtomicBool,
    available: bool,
    failing_publishes: AtomicU32,
}

impl MemoryQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            deliveries: Mutex::new(VecDeque::new()),
            created: AtomicBool::new(false),
            available: true,
            failing_publishes: AtomicU32::new(0),
        }
    }

    /// A queue that refuses every create and publish.
    pub fn unavailable(name: impl Into<String>) -> Self {
        Self {
            available: false,
            ..Self::new(name)
        }
    }

    /// Makes the next `count` publishes fail.
    pub fn fail_next_publishes(&self, count: u32) {
        self.failing_publishes.store(count, Ordering::SeqCst);
    }

    pub fn exists(&self) -> bool {
        self.created.load(Ordering::SeqCst)
    }

    pub async fn receive(&self) -> Option<Delivery> {
        self.deliveries.lock().await.pop_front()
    }

    pub async fn len(&self) -> usize {
        self.deliveries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.deliveries.lock().await.is_empty()
    }

    fn check(&self) -> QueueResult<()> {
        if self.available {
            Ok(())
        } else {
            Err(QueueError::Unavailable(self.name.clone()))
        }
    }
}

#[async_trait]
impl OrderQueue for MemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ensure_exists(&self) -> QueueResult<()> {
        self.check()?;
        self.created.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn publish(&self, delivery: &Delivery) -> QueueResult<()> {
        self.check()?;
        let failing = self
            .failing_publishes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(QueueError::Unavailable(self.name.clone()));
        }
        self.deliveries.lock().await.push_back(delivery.clone());
        Ok(())
    }
}
