use anyhow::Result;
use clap::Parser;
use order_api::api;
use order_api::config::Args;
use shared::queue::kafka::KafkaQueue;
use shared::store::postgres::{self, PgOrderStore};
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

    let app_state = api::AppState {
        store: Arc::new(PgOrderStore::new(pool)),
        queue: Arc::new(queue),
        base64_messages: args.base64_messages,
    };

    let app = api::create_router(app_state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", args.port)).await?;

    info!("Order API started on port {}", args.port);
    info!("Enqueueing order messages onto {}", args.queue_name);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down order API");
        })
        .await?;

    Ok(())
}
