use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::{DecodeError, OrderMessage};

pub const DEFAULT_STATUS: &str = "Pending";
pub const EMPTY_ITEMS: &str = "[]";

/// Current state of an order as kept in the orders store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub order_id: String,
    pub customer_id: String,
    pub status: String,
    pub total_amount: f64,
    pub order_date: DateTime<Utc>,
    /// JSON array of [`OrderItem`], stored as text.
    pub items_json: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: String,
    pub quantity: i32,
    pub price: f64,
}

impl OrderRecord {
    /// Builds the full replacement row for a create-or-update.
    ///
    /// Fields the message leaves out are reset to their defaults rather than
    /// carried over from whatever row exists today.
    pub fn from_message(message: OrderMessage, now: DateTime<Utc>) -> Result<Self, DecodeError> {
        let customer_id = message
            .customer_id
            .filter(|id| !id.trim().is_empty())
            .ok_or(DecodeError::MissingField("customerId"))?;

        Ok(Self {
            order_id: message.order_id,
            customer_id,
            status: message.status.unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            total_amount: message.total_amount.unwrap_or(0.0),
            order_date: message.order_date.unwrap_or(now),
            items_json: message.items_json.unwrap_or_else(|| EMPTY_ITEMS.to_string()),
        })
    }

    pub fn items(&self) -> Result<Vec<OrderItem>, serde_json::Error> {
        serde_json::from_str(&self.items_json)
    }
}
