use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

pub mod event_types {
    pub const ORDER_PAID: &str = "order.paid";
    pub const ORDER_COMPLETED: &str = "order.completed";
    pub const ORDER_FAILED: &str = "order.failed";
    pub const PAYMENT_COMPLETED: &str = "payment.completed";
    pub const PAYMENT_FAILED: &str = "payment.failed";
    pub const BOOKING_CANCELLED: &str = "booking.cancelled";
    pub const REFUND_COMPLETED: &str = "refund.completed";
    pub const REFUND_FAILED: &str = "refund.failed";
    pub const WITHDRAWAL_REQUESTED: &str = "withdrawal.requested";
    pub const WITHDRAWAL_APPROVED: &str = "withdrawal.approved";
    pub const WITHDRAWAL_REJECTED: &str = "withdrawal.rejected";
    pub const WITHDRAWAL_COMPLETED: &str = "withdrawal.completed";
    pub const WITHDRAWAL_FAILED: &str = "withdrawal.failed";
    pub const WEBHOOK_RECEIVED: &str = "webhook.received";
}

/// The unit published on the bus. Immutable after construction; published
/// only after the owning database transaction has committed.
#[derive(Debug, Clone, Serialize)]
pub struct DomainEvent {
    pub event_type: String,
    pub data: Map<String, Value>,
    pub source_module: String,
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent {
    /// `data` must serialize to a JSON object; anything else becomes an
    /// empty payload.
    pub fn new(event_type: &str, source_module: &str, data: Value) -> Self {
        let data = match data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            event_type: event_type.to_string(),
            data,
            source_module: source_module.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }
}
