use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub mod flutterwave;
pub mod mock;
pub mod paystack;

/// Canonical event vocabulary. Every provider-specific webhook type maps
/// into one of these four, per the adapter's documented mapping table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalEventKind {
    ChargeCompleted,
    ChargeFailed,
    TransferCompleted,
    TransferFailed,
}

impl CanonicalEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalEventKind::ChargeCompleted => "charge_completed",
            CanonicalEventKind::ChargeFailed => "charge_failed",
            CanonicalEventKind::TransferCompleted => "transfer_completed",
            CanonicalEventKind::TransferFailed => "transfer_failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CanonicalEvent {
    pub kind: CanonicalEventKind,
    /// Our reference for the charge/transfer, echoed back by the gateway.
    pub reference: String,
    pub gateway_transaction_id: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub reference: String,
    pub amount: Decimal,
    pub currency: String,
    pub customer_email: String,
}

#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub reference: String,
    pub amount: Decimal,
    pub currency: String,
    pub account_number: String,
    pub bank_code: String,
    pub narration: String,
}

/// Normalized shape for every outbound gateway call, regardless of provider.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayResponse {
    pub success: bool,
    pub reference: Option<String>,
    pub raw: serde_json::Value,
}

#[async_trait::async_trait]
pub trait GatewayAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Header the provider carries its webhook signature in.
    fn signature_header(&self) -> &'static str;

    /// Constant-time verification of the raw webhook bytes against the
    /// provider's signature scheme.
    fn verify_signature(&self, raw_body: &[u8], signature_header: &str) -> bool;

    /// Stable dedupe identifier for this delivery. None means the payload
    /// carries no usable identity and must be rejected, not synthesized.
    fn extract_event_id(&self, payload: &serde_json::Value) -> Option<String>;

    fn normalize_event(&self, payload: &serde_json::Value) -> Result<CanonicalEvent, CoreError>;

    async fn initiate_charge(&self, request: &ChargeRequest) -> Result<GatewayResponse, CoreError>;

    async fn verify_charge(&self, reference: &str) -> Result<GatewayResponse, CoreError>;

    async fn resolve_bank_account(
        &self,
        account_number: &str,
        bank_code: &str,
    ) -> Result<GatewayResponse, CoreError>;

    async fn initiate_transfer(&self, request: &TransferRequest)
        -> Result<GatewayResponse, CoreError>;
}

/// Provider name -> adapter, resolved once at startup. Replaces per-call
/// conditional dispatch on the provider string.
#[derive(Clone, Default)]
pub struct GatewayRegistry {
    adapters: HashMap<String, Arc<dyn GatewayAdapter>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: Arc<dyn GatewayAdapter>) {
        self.adapters.insert(adapter.name().to_string(), adapter);
    }

    pub fn get(&self, provider: &str) -> Option<Arc<dyn GatewayAdapter>> {
        self.adapters.get(provider).cloned()
    }

    pub fn require(&self, provider: &str) -> Result<Arc<dyn GatewayAdapter>, CoreError> {
        self.get(provider).ok_or_else(|| {
            CoreError::business("UNKNOWN_PROVIDER", format!("no adapter for provider {provider}"))
        })
    }
}

/// Maps reqwest failures to the taxonomy: timeouts and connect errors are
/// transient (5xx so the caller retries), everything else is internal.
pub(crate) fn map_outbound_error(provider: &str, err: reqwest::Error) -> CoreError {
    if err.is_timeout() || err.is_connect() {
        CoreError::GatewayUnavailable(format!("{provider}: {err}"))
    } else {
        CoreError::Internal(err.into())
    }
}

/// Minor-unit integer (kobo, cents) to a two-decimal amount.
pub(crate) fn amount_from_minor(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}
