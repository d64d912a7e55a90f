use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{
    encode_payload, Delivery, OrderAction, OrderMessage, OrderQueue, OrderRecord, OrderStore,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn OrderStore>,
    pub queue: Arc<dyn OrderQueue>,
    pub base64_messages: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueResponse {
    pub message_id: String,
    pub queue: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOrdersQuery {
    pub customer_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertOrderRequest {
    pub customer_id: Option<String>,
    pub status: Option<String>,
    pub total_amount: Option<f64>,
    pub order_date: Option<DateTime<Utc>>,
    pub items_json: Option<String>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/orders", get(list_orders))
        .route("/orders/enqueue", post(enqueue_order))
        .route(
            "/orders/:order_id",
            get(get_order).put(upsert_order).delete(delete_order),
        )
        .route("/health", get(health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

/// Hands the body to the order queue untouched and returns before it is
/// processed.
pub async fn enqueue_order(
    State(state): State<AppState>,
    body: String,
) -> Result<(StatusCode, Json<EnqueueResponse>), ApiError> {
    if body.trim().is_empty() {
        return Err(ApiError::Validation("request body is empty".to_string()));
    }

    let delivery = Delivery::new(encode_payload(&body, state.base64_messages));
    state.queue.ensure_exists().await?;
    state.queue.publish(&delivery).await?;

    tracing::info!(
        "Enqueued order message {} on {}",
        delivery.message_id,
        state.queue.name()
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(EnqueueResponse {
            message_id: delivery.message_id,
            queue: state.queue.name().to_string(),
            status: "queued".to_string(),
        }),
    ))
}

pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<OrderRecord>>, ApiError> {
    let orders = state.store.list(query.customer_id.as_deref()).await?;
    Ok(Json(orders))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderRecord>, ApiError> {
    let order = state.store.get(&order_id).await?;
    order.map(Json).ok_or(ApiError::NotFound(order_id))
}

/// Synchronous counterpart of a `CreateOrUpdate` message: same defaults,
/// same full replace.
pub async fn upsert_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    request: Result<Json<UpsertOrderRequest>, JsonRejection>,
) -> Result<Json<OrderRecord>, ApiError> {
    let Json(request) = request.map_err(|e| ApiError::Validation(e.body_text()))?;
    let message = OrderMessage {
        customer_id: request.customer_id,
        status: request.status,
        total_amount: request.total_amount,
        order_date: request.order_date,
        items_json: request.items_json,
        ..OrderMessage::new(OrderAction::CreateOrUpdate, order_id)
    };

    let record = OrderRecord::from_message(message, Utc::now())
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    record
        .items()
        .map_err(|e| ApiError::Validation(format!("itemsJson is not a list of items: {}", e)))?;

    state.store.upsert(record.clone()).await?;
    tracing::info!("Order {} saved", record.order_id);

    Ok(Json(record))
}

pub async fn delete_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.store.delete(&order_id).await? {
        tracing::info!("Order {} deleted", order_id);
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn health_check() -> &'static str {
    "OK"
}
