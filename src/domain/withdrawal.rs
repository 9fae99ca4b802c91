use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_WITHDRAWAL_RETRIES: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
    Processing,
    Completed,
    Failed,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Rejected => "rejected",
            WithdrawalStatus::Processing => "processing",
            WithdrawalStatus::Completed => "completed",
            WithdrawalStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(WithdrawalStatus::Pending),
            "approved" => Some(WithdrawalStatus::Approved),
            "rejected" => Some(WithdrawalStatus::Rejected),
            "processing" => Some(WithdrawalStatus::Processing),
            "completed" => Some(WithdrawalStatus::Completed),
            "failed" => Some(WithdrawalStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalType {
    Revenue,
    Commission,
    Refund,
    Manual,
}

impl WithdrawalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalType::Revenue => "revenue",
            WithdrawalType::Commission => "commission",
            WithdrawalType::Refund => "refund",
            WithdrawalType::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "revenue" => Some(WithdrawalType::Revenue),
            "commission" => Some(WithdrawalType::Commission),
            "refund" => Some(WithdrawalType::Refund),
            "manual" => Some(WithdrawalType::Manual),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Withdrawal {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub bank_account_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub withdrawal_type: WithdrawalType,
    pub status: WithdrawalStatus,
    pub reference: String,
    pub gateway_transaction_id: Option<String>,
    pub approved_by: Option<Uuid>,
    pub processed_by: Option<Uuid>,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row per status transition, append-only.
#[derive(Debug, Clone, Serialize)]
pub struct WithdrawalLogEntry {
    pub id: i64,
    pub withdrawal_id: Uuid,
    pub actor: String,
    pub prior_status: Option<WithdrawalStatus>,
    pub next_status: WithdrawalStatus,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BankAccount {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub account_number: String,
    pub bank_code: String,
    pub account_name: String,
    pub verified: bool,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestWithdrawalRequest {
    pub owner_id: Uuid,
    pub bank_account_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub withdrawal_type: WithdrawalType,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBankAccountRequest {
    pub owner_id: Uuid,
    pub account_number: String,
    pub bank_code: String,
    pub is_default: bool,
}
