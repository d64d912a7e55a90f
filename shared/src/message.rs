//! Queue envelope for order mutations.
//!
//! Producers do not agree on an encoding: some put raw JSON on the queue,
//! others wrap it in base64. Field names arrive in whatever casing the
//! producer used. Everything here turns those bytes into an [`OrderMessage`]
//! or a [`DecodeError`] explaining why it could not.

use base64::prelude::*;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderAction {
    CreateOrUpdate,
    Delete,
    /// Anything else a producer sent. Kept verbatim for logging.
    Other(String),
}

impl OrderAction {
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("createorupdate") {
            OrderAction::CreateOrUpdate
        } else if trimmed.eq_ignore_ascii_case("delete") {
            OrderAction::Delete
        } else {
            OrderAction::Other(value.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            OrderAction::CreateOrUpdate => "CreateOrUpdate",
            OrderAction::Delete => "Delete",
            OrderAction::Other(other) => other,
        }
    }
}

impl Serialize for OrderAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderMessage {
    pub action: OrderAction,
    pub order_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_json: Option<String>,
}

impl OrderMessage {
    pub fn new(action: OrderAction, order_id: impl Into<String>) -> Self {
        Self {
            action,
            order_id: order_id.into(),
            customer_id: None,
            status: None,
            total_amount: None,
            order_date: None,
            items_json: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("message payload is empty")]
    Empty,
    #[error("message payload is not valid UTF-8")]
    NotUtf8,
    #[error("message payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("message payload is not a JSON object")]
    NotAnObject,
    #[error("required field `{0}` is missing")]
    MissingField(&'static str),
    #[error("field `{field}` is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Decodes raw queue bytes into an [`OrderMessage`].
pub fn decode_envelope(raw: &[u8]) -> Result<OrderMessage, DecodeError> {
    let text = decode_payload(raw)?;
    parse_message(&text)
}

/// Base64 first, raw text second.
///
/// A payload is only treated as base64 when it decodes cleanly and the
/// decoded bytes are UTF-8. JSON text never survives the base64 alphabet,
/// so unwrapped producers always land in the second branch.
pub fn decode_payload(raw: &[u8]) -> Result<String, DecodeError> {
    let trimmed = raw.trim_ascii();
    if trimmed.is_empty() {
        return Err(DecodeError::Empty);
    }

    if let Ok(bytes) = BASE64_STANDARD.decode(trimmed) {
        if let Ok(text) = String::from_utf8(bytes) {
            return Ok(text);
        }
    }

    std::str::from_utf8(trimmed)
        .map(str::to_string)
        .map_err(|_| DecodeError::NotUtf8)
}

pub fn parse_message(text: &str) -> Result<OrderMessage, DecodeError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(object) = value else {
        return Err(DecodeError::NotAnObject);
    };
    let fields = Fields::new(object);

    let action = fields
        .string("action")?
        .ok_or(DecodeError::MissingField("action"))?;
    let order_id = fields
        .string("orderId")?
        .filter(|id| !id.trim().is_empty())
        .ok_or(DecodeError::MissingField("orderId"))?;

    Ok(OrderMessage {
        action: OrderAction::parse(&action),
        order_id,
        customer_id: fields.string("customerId")?,
        status: fields.string("status")?,
        total_amount: fields.number("totalAmount")?,
        order_date: fields.timestamp("orderDate")?,
        items_json: fields.json_text("itemsJson")?,
    })
}

/// Prepares a message body for publishing.
pub fn encode_payload(text: &str, base64: bool) -> Vec<u8> {
    if base64 {
        BASE64_STANDARD.encode(text).into_bytes()
    } else {
        text.as_bytes().to_vec()
    }
}

/// Object fields keyed by lowercased name. `null` counts as absent.
struct Fields(Map<String, Value>);

impl Fields {
    fn new(object: Map<String, Value>) -> Self {
        Self(
            object
                .into_iter()
                .filter(|(_, value)| !value.is_null())
                .map(|(key, value)| (key.to_ascii_lowercase(), value))
                .collect(),
        )
    }

    fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(&name.to_ascii_lowercase())
    }

    fn string(&self, name: &'static str) -> Result<Option<String>, DecodeError> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(invalid(name, format!("expected a string, got {other}"))),
        }
    }

    fn number(&self, name: &'static str) -> Result<Option<f64>, DecodeError> {
        let number = match self.get(name) {
            None => return Ok(None),
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            Some(_) => None,
        };
        match number {
            Some(n) if n.is_finite() => Ok(Some(n)),
            _ => Err(invalid(name, "expected a finite number".to_string())),
        }
    }

    fn timestamp(&self, name: &'static str) -> Result<Option<DateTime<Utc>>, DecodeError> {
        let Some(raw) = self.string(name)? else {
            return Ok(None);
        };
        if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(Some(parsed.with_timezone(&Utc)));
        }
        NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| Some(naive.and_utc()))
            .map_err(|e| invalid(name, e.to_string()))
    }

    /// Items normally arrive pre-serialized; a bare array is accepted too.
    fn json_text(&self, name: &'static str) -> Result<Option<String>, DecodeError> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(array @ Value::Array(_)) => Ok(Some(array.to_string())),
            Some(other) => Err(invalid(name, format!("expected a string, got {other}"))),
        }
    }
}

fn invalid(field: &'static str, reason: String) -> DecodeError {
    DecodeError::InvalidField { field, reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{"action":"CreateOrUpdate","orderId":"O1","customerId":"C1","status":"Shipped","totalAmount":12.5,"orderDate":"2024-03-01T10:00:00Z","itemsJson":"[]"}"#;

    #[test]
    fn decodes_raw_json() {
        let message = decode_envelope(SAMPLE.as_bytes()).unwrap();
        assert_eq!(message.action, OrderAction::CreateOrUpdate);
        assert_eq!(message.order_id, "O1");
        assert_eq!(message.customer_id.as_deref(), Some("C1"));
        assert_eq!(message.status.as_deref(), Some("Shipped"));
        assert_eq!(message.total_amount, Some(12.5));
        assert_eq!(
            message.order_date.unwrap().to_rfc3339(),
            "2024-03-01T10:00:00+00:00"
        );
    }

    #[test]
    fn base64_and_raw_payloads_decode_the_same() {
        let wrapped = encode_payload(SAMPLE, true);
        assert_ne!(wrapped, SAMPLE.as_bytes());
        assert_eq!(
            decode_envelope(&wrapped).unwrap(),
            decode_envelope(SAMPLE.as_bytes()).unwrap()
        );
    }

    #[test]
    fn field_names_are_case_insensitive() {
        let text = r#"{"ACTION":"delete","OrderID":"O2","CUSTOMERID":"C2","TotalAmount":"7"}"#;
        let message = parse_message(text).unwrap();
        assert_eq!(message.action, OrderAction::Delete);
        assert_eq!(message.order_id, "O2");
        assert_eq!(message.customer_id.as_deref(), Some("C2"));
        assert_eq!(message.total_amount, Some(7.0));
    }

    #[test]
    fn unknown_action_is_preserved() {
        let message = parse_message(r#"{"action":"Archive","orderId":"O3"}"#).unwrap();
        assert_eq!(message.action, OrderAction::Other("Archive".to_string()));
    }

    #[test]
    fn nulls_count_as_absent() {
        let message =
            parse_message(r#"{"action":"CreateOrUpdate","orderId":"O4","status":null}"#).unwrap();
        assert!(message.status.is_none());
        assert!(message.customer_id.is_none());
    }

    #[test]
    fn items_array_is_kept_as_text() {
        let text = r#"{"action":"CreateOrUpdate","orderId":"O5","itemsJson":[{"productId":"P1","quantity":2,"price":3.5}]}"#;
        let message = parse_message(text).unwrap();
        let items: Value = serde_json::from_str(message.items_json.as_deref().unwrap()).unwrap();
        assert_eq!(
            items,
            serde_json::json!([{"productId": "P1", "quantity": 2, "price": 3.5}])
        );
    }

    #[test]
    fn offsetless_timestamps_are_utc() {
        let text = r#"{"action":"CreateOrUpdate","orderId":"O6","orderDate":"2024-03-01T10:00:00.250"}"#;
        let message = parse_message(text).unwrap();
        assert_eq!(
            message.order_date.unwrap().to_rfc3339(),
            "2024-03-01T10:00:00.250+00:00"
        );
    }

    #[test]
    fn rejects_unusable_payloads() {
        assert!(matches!(decode_envelope(b"   "), Err(DecodeError::Empty)));
        assert!(matches!(
            decode_envelope(b"{not json"),
            Err(DecodeError::InvalidJson(_))
        ));
        assert!(matches!(
            decode_envelope(b"[1,2,3]"),
            Err(DecodeError::NotAnObject)
        ));
        assert!(matches!(
            decode_envelope(br#"{"orderId":"O1"}"#),
            Err(DecodeError::MissingField("action"))
        ));
        assert!(matches!(
            decode_envelope(br#"{"action":"Delete","orderId":"  "}"#),
            Err(DecodeError::MissingField("orderId"))
        ));
        assert!(matches!(
            decode_envelope(br#"{"action":"Delete","orderId":"O1","totalAmount":"lots"}"#),
            Err(DecodeError::InvalidField { field: "totalAmount", .. })
        ));
        assert!(matches!(
            decode_envelope(&[0xff, 0xfe, 0x7b]),
            Err(DecodeError::NotUtf8)
        ));
    }

    #[test]
    fn serializes_to_wire_names() {
        let mut message = OrderMessage::new(OrderAction::CreateOrUpdate, "O7");
        message.customer_id = Some("C7".to_string());
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"action": "CreateOrUpdate", "orderId": "O7", "customerId": "C7"})
        );
    }
}
