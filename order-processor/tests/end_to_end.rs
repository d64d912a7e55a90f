use axum::body::Body;
use axum::http::{Request, StatusCode};
use order_api::api::{create_router, AppState};
use order_processor::processor::{OrderProcessor, ProcessOutcome};
use shared::queue::memory::MemoryQueue;
use shared::store::memory::MemoryOrderStore;
use std::sync::Arc;
use tower::ServiceExt;

async fn enqueue_and_read_back(base64_messages: bool) {
    let store = Arc::new(MemoryOrderStore::new());
    let queue = Arc::new(MemoryQueue::new("order-messages"));
    let router = create_router(AppState {
        store: store.clone(),
        queue: queue.clone(),
        base64_messages,
    });
    let processor = OrderProcessor::new(store.clone());

    let request = Request::builder()
        .method("POST")
        .uri("/orders/enqueue")
        .body(Body::from(
            r#"{"action":"CreateOrUpdate","orderId":"O9","customerId":"C9","status":"Processing"}"#,
        ))
        .expect("request");
    let response = router.clone().oneshot(request).await.expect("enqueue");
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let not_yet = Request::builder()
        .uri("/orders/O9")
        .body(Body::empty())
        .expect("request");
    let response = router.clone().oneshot(not_yet).await.expect("get");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let delivery = queue.receive().await.expect("queued message");
    let outcome = processor.process(&delivery.payload).await.expect("processed");
    assert_eq!(
        outcome,
        ProcessOutcome::Upserted {
            order_id: "O9".to_string()
        }
    );

    let read = Request::builder()
        .uri("/orders/O9")
        .body(Body::empty())
        .expect("request");
    let response = router.clone().oneshot(read).await.expect("get");
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let order: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(order["orderId"], "O9");
    assert_eq!(order["customerId"], "C9");
    assert_eq!(order["status"], "Processing");
}

#[tokio::test]
async fn enqueued_order_is_readable_after_processing() {
    enqueue_and_read_back(false).await;
}

#[tokio::test]
async fn base64_enqueued_order_is_readable_after_processing() {
    enqueue_and_read_back(true).await;
}
