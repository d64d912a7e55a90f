#![allow(dead_code)]

use axum::body::Body;
use axum::http::Request;
use axum::Router;
use order_api::api::{create_router, AppState};
use shared::queue::memory::MemoryQueue;
use shared::store::memory::MemoryOrderStore;
use std::sync::Arc;

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryOrderStore>,
    pub queue: Arc<MemoryQueue>,
}

pub fn test_app(base64_messages: bool) -> TestApp {
    with_queue(MemoryQueue::new("order-messages"), base64_messages)
}

pub fn with_queue(queue: MemoryQueue, base64_messages: bool) -> TestApp {
    let store = Arc::new(MemoryOrderStore::new());
    let queue = Arc::new(queue);
    let router = create_router(AppState {
        store: store.clone(),
        queue: queue.clone(),
        base64_messages,
    });
    TestApp {
        router,
        store,
        queue,
    }
}

pub fn text_request(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "text/plain")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}
