mod common;

use axum::http::StatusCode;
use common::{read_json, test_app, text_request, with_queue};
use shared::message::decode_payload;
use shared::queue::memory::MemoryQueue;
use tower::ServiceExt;

const ORDER: &str =
    r#"{"action":"CreateOrUpdate","orderId":"O9","customerId":"C9","status":"Processing"}"#;

#[tokio::test]
async fn enqueue_accepts_and_publishes_body() {
    let app = test_app(false);

    let response = app
        .router
        .clone()
        .oneshot(text_request("POST", "/orders/enqueue", ORDER))
        .await
        .expect("enqueue");
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = read_json(response).await;
    assert_eq!(body["status"], "queued");
    assert_eq!(body["queue"], "order-messages");

    assert!(app.queue.exists());
    let delivery = app.queue.receive().await.expect("message");
    assert_eq!(delivery.payload, ORDER.as_bytes());
    assert_eq!(delivery.dequeue_count, 0);
    assert_eq!(body["messageId"], delivery.message_id.as_str());
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn enqueue_base64_wraps_payload() {
    let app = test_app(true);

    let response = app
        .router
        .clone()
        .oneshot(text_request("POST", "/orders/enqueue", ORDER))
        .await
        .expect("enqueue");
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let published = app.queue.receive().await.expect("message").payload;
    assert_ne!(published, ORDER.as_bytes());
    assert_eq!(decode_payload(&published).unwrap(), ORDER);
}

#[tokio::test]
async fn enqueue_does_not_validate_body_shape() {
    let app = test_app(false);

    let response = app
        .router
        .clone()
        .oneshot(text_request("POST", "/orders/enqueue", "not even json"))
        .await
        .expect("enqueue");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(app.queue.len().await, 1);
}

#[tokio::test]
async fn enqueue_rejects_empty_body() {
    let app = test_app(false);

    for body in ["", "   \n"] {
        let response = app
            .router
            .clone()
            .oneshot(text_request("POST", "/orders/enqueue", body))
            .await
            .expect("enqueue");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error = read_json(response).await;
        assert!(error["error"].as_str().unwrap().contains("empty"));
    }
    assert!(app.queue.is_empty().await);
}

#[tokio::test]
async fn enqueue_surfaces_publish_failure() {
    let app = with_queue(MemoryQueue::unavailable("order-messages"), false);

    let response = app
        .router
        .clone()
        .oneshot(text_request("POST", "/orders/enqueue", ORDER))
        .await
        .expect("enqueue");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn each_enqueue_gets_its_own_message_id() {
    let app = test_app(false);

    let mut ids = Vec::new();
    for _ in 0..2 {
        let response = app
            .router
            .clone()
            .oneshot(text_request("POST", "/orders/enqueue", ORDER))
            .await
            .expect("enqueue");
        ids.push(read_json(response).await["messageId"].clone());
    }
    assert_ne!(ids[0], ids[1]);

    for id in ids {
        let delivery = app.queue.receive().await.expect("message");
        assert_eq!(id, delivery.message_id.as_str());
    }
}
