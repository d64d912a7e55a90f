use async_trait::async_trait;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::message::{Header, Headers, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::Message;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::info;

use super::{
    Delivery, OrderQueue, QueueError, QueueResult, DEQUEUE_COUNT_HEADER, MESSAGE_ID_HEADER,
};

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// A Kafka topic used as the order queue.
///
/// The partition count bounds how many processors in one consumer group
/// receive messages at the same time.
pub struct KafkaQueue {
    topic: String,
    partitions: i32,
    producer: FutureProducer,
    admin: AdminClient<DefaultClientContext>,
    created: OnceCell<()>,
}

impl KafkaQueue {
    pub fn new(brokers: &str, topic: impl Into<String>, partitions: i32) -> QueueResult<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        let admin: AdminClient<DefaultClientContext> = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .create()?;

        Ok(Self {
            topic: topic.into(),
            partitions,
            producer,
            admin,
            created: OnceCell::new(),
        })
    }

    async fn create_topic(&self) -> QueueResult<()> {
        let topic = NewTopic::new(&self.topic, self.partitions, TopicReplication::Fixed(1));
        let results = self
            .admin
            .create_topics([&topic], &AdminOptions::new())
            .await?;

        for result in results {
            match result {
                Ok(name) => info!(
                    "Created queue topic {} with {} partitions",
                    name, self.partitions
                ),
                Err((_, RDKafkaErrorCode::TopicAlreadyExists)) => {}
                Err((name, code)) => {
                    return Err(QueueError::CreateFailed {
                        queue: name,
                        reason: code.to_string(),
                    })
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl OrderQueue for KafkaQueue {
    fn name(&self) -> &str {
        &self.topic
    }

    async fn ensure_exists(&self) -> QueueResult<()> {
        self.created
            .get_or_try_init(|| self.create_topic())
            .await
            .map(|_| ())
    }

    async fn publish(&self, delivery: &Delivery) -> QueueResult<()> {
        let record = FutureRecord::<(), [u8]>::to(&self.topic)
            .payload(&delivery.payload)
            .headers(delivery_headers(delivery));

        self.producer
            .send(record, SEND_TIMEOUT)
            .await
            .map_err(|(e, _)| QueueError::Kafka(e))?;
        Ok(())
    }
}

pub fn delivery_headers(delivery: &Delivery) -> OwnedHeaders {
    let count = delivery.dequeue_count.to_string();
    OwnedHeaders::new()
        .insert(Header {
            key: MESSAGE_ID_HEADER,
            value: Some(delivery.message_id.as_str()),
        })
        .insert(Header {
            key: DEQUEUE_COUNT_HEADER,
            value: Some(count.as_str()),
        })
}

/// Rebuilds a [`Delivery`] from a consumed record.
///
/// Records from producers that set no headers count as first deliveries and
/// are identified by their topic position.
pub fn delivery_from_message<M: Message>(message: &M) -> Delivery {
    let header_value = |name: &str| {
        message.headers().and_then(|headers| {
            headers
                .iter()
                .find(|header| header.key == name)
                .and_then(|header| header.value)
                .and_then(|value| std::str::from_utf8(value).ok())
                .map(str::to_string)
        })
    };

    let message_id = header_value(MESSAGE_ID_HEADER).unwrap_or_else(|| {
        format!(
            "{}-{}-{}",
            message.topic(),
            message.partition(),
            message.offset()
        )
    });
    let dequeue_count = header_value(DEQUEUE_COUNT_HEADER)
        .and_then(|value| parse_dequeue_count(&value))
        .unwrap_or(0);

    Delivery {
        message_id,
        payload: message.payload().unwrap_or_default().to_vec(),
        dequeue_count,
    }
}

pub fn parse_dequeue_count(value: &str) -> Option<u32> {
    value.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdkafka::message::OwnedMessage;
    use rdkafka::Timestamp;

    fn record(payload: &[u8], headers: Option<OwnedHeaders>) -> OwnedMessage {
        OwnedMessage::new(
            Some(payload.to_vec()),
            None,
            "order-messages".to_string(),
            Timestamp::NotAvailable,
            2,
            41,
            headers,
        )
    }

    #[test]
    fn headers_carry_id_and_count() {
        let original = Delivery::new(b"{}".to_vec()).retry(3);
        let received = delivery_from_message(&record(b"{}", Some(delivery_headers(&original))));
        assert_eq!(received, original);
    }

    #[test]
    fn bare_records_are_first_deliveries() {
        let received = delivery_from_message(&record(b"payload", None));
        assert_eq!(received.message_id, "order-messages-2-41");
        assert_eq!(received.dequeue_count, 0);
        assert_eq!(received.payload, b"payload");
    }

    #[test]
    fn parses_header_values() {
        assert_eq!(parse_dequeue_count("3"), Some(3));
        assert_eq!(parse_dequeue_count(" 12 "), Some(12));
        assert_eq!(parse_dequeue_count("-1"), None);
        assert_eq!(parse_dequeue_count("three"), None);
    }
}
