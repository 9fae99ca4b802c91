use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::refund::RefundStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationStatus {
    Pending,
    Approved,
    Rejected,
    Refunded,
}

impl CancellationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancellationStatus::Pending => "pending",
            CancellationStatus::Approved => "approved",
            CancellationStatus::Rejected => "rejected",
            CancellationStatus::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(CancellationStatus::Pending),
            "approved" => Some(CancellationStatus::Approved),
            "rejected" => Some(CancellationStatus::Rejected),
            "refunded" => Some(CancellationStatus::Refunded),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationReason {
    ChangeOfPlans,
    FoundAlternative,
    Emergency,
    Other,
}

impl CancellationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancellationReason::ChangeOfPlans => "change_of_plans",
            CancellationReason::FoundAlternative => "found_alternative",
            CancellationReason::Emergency => "emergency",
            CancellationReason::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "change_of_plans" => Some(CancellationReason::ChangeOfPlans),
            "found_alternative" => Some(CancellationReason::FoundAlternative),
            "emergency" => Some(CancellationReason::Emergency),
            "other" => Some(CancellationReason::Other),
            _ => None,
        }
    }
}

/// One per booking. The policy outcome (hours snapshot, percentage, split)
/// is frozen at cancellation time and never recomputed.
#[derive(Debug, Clone, Serialize)]
pub struct BookingCancellation {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub reason: CancellationReason,
    pub feedback: Option<String>,
    pub would_rebook: Option<bool>,
    pub hours_until_checkin: f64,
    pub refund_percentage: Decimal,
    pub refund_amount: Decimal,
    pub penalty_amount: Decimal,
    pub status: CancellationStatus,
    pub refund_status: RefundStatus,
    pub refund_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelBookingRequest {
    pub reason: CancellationReason,
    pub feedback: Option<String>,
    pub would_rebook: Option<bool>,
}
