use anyhow::Result;
use clap::Parser;
use order_processor::config::Args;
use order_processor::processor::OrderProcessor;
use order_processor::worker::QueueWorker;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use shared::queue::kafka::KafkaQueue;
use shared::store::postgres::{self, PgOrderStore};
use shared::OrderQueue;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    postgres::run_migrations(&args.database_url)?;
    let pool = postgres::connect(&args.database_url).await?;

    let queue = KafkaQueue::new(
        &args.kafka_brokers,
        args.queue_name.clone(),
        args.queue_partitions,
    )?;
    queue.ensure_exists().await?;
    let poison_queue = KafkaQueue::new(&args.kafka_brokers, args.poison_queue_name(), 1)?;

    let consumer: StreamConsumer = ClientConfig::new()
        .set("group.id", &args.consumer_group)
        .set("bootstrap.servers", &args.kafka_brokers)
        .set("enable.partition.eof", "false")
        .set("session.timeout.ms", "6000")
        .set("enable.auto.commit", "false")
        .set("auto.offset.reset", "earliest")
        .create()?;

    consumer.subscribe(&[&args.queue_name])?;

    let processor = OrderProcessor::new(Arc::new(PgOrderStore::new(pool)));
    let worker = QueueWorker::new(
        processor,
        Arc::new(queue),
        Arc::new(poison_queue),
        args.retry_policy(),
    );

    info!(
        "Order processor consuming {} (poison queue {})",
        args.queue_name,
        args.poison_queue_name()
    );

    tokio::select! {
        _ = worker.run(consumer) => info!("Order queue stream ended"),
        _ = tokio::signal::ctrl_c() => info!("Shutting down order processor"),
    }

    Ok(())
}
