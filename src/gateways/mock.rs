use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::error::CoreError;
use crate::gateways::{
    CanonicalEvent, CanonicalEventKind, ChargeRequest, GatewayAdapter, GatewayResponse,
    TransferRequest,
};

/// Deterministic adapter for tests and local development. The signature is
/// the shared secret verbatim; payloads use the canonical vocabulary
/// directly: {"event": "charge_completed", "reference": "...", ...}.
pub struct MockAdapter {
    pub secret: String,
    pub behavior: String,
}

impl MockAdapter {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.to_string(),
            behavior: "ALWAYS_SUCCESS".to_string(),
        }
    }
}

#[async_trait::async_trait]
impl GatewayAdapter for MockAdapter {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn signature_header(&self) -> &'static str {
        "x-mock-signature"
    }

    fn verify_signature(&self, _raw_body: &[u8], signature_header: &str) -> bool {
        signature_header == self.secret
    }

    fn extract_event_id(&self, payload: &Value) -> Option<String> {
        payload
            .get("event_id")
            .or_else(|| payload.get("reference"))
            .and_then(Value::as_str)
            .map(ToString::to_string)
    }

    fn normalize_event(&self, payload: &Value) -> Result<CanonicalEvent, CoreError> {
        let event = payload
            .get("event")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::MalformedInput("missing event field".to_string()))?;

        let kind = match event {
            "charge_completed" => CanonicalEventKind::ChargeCompleted,
            "charge_failed" => CanonicalEventKind::ChargeFailed,
            "transfer_completed" => CanonicalEventKind::TransferCompleted,
            "transfer_failed" => CanonicalEventKind::TransferFailed,
            other => {
                return Err(CoreError::business(
                    "UNSUPPORTED_EVENT",
                    format!("mock event {other} has no canonical mapping"),
                ))
            }
        };

        let reference = payload
            .get("reference")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::MalformedInput("missing reference".to_string()))?
            .to_string();

        Ok(CanonicalEvent {
            kind,
            reference,
            gateway_transaction_id: payload
                .get("transaction_id")
                .and_then(Value::as_str)
                .map(ToString::to_string),
            amount: payload
                .get("amount")
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<Decimal>().ok()),
            currency: payload
                .get("currency")
                .and_then(Value::as_str)
                .map(ToString::to_string),
            raw: payload.clone(),
        })
    }

    async fn initiate_charge(&self, request: &ChargeRequest) -> Result<GatewayResponse, CoreError> {
        if self.behavior == "ALWAYS_FAILURE" {
            return Ok(GatewayResponse {
                success: false,
                reference: Some(request.reference.clone()),
                raw: json!({"status": false, "message": "mock decline"}),
            });
        }
        Ok(GatewayResponse {
            success: true,
            reference: Some(request.reference.clone()),
            raw: json!({
                "status": true,
                "data": {
                    "reference": request.reference,
                    "authorization_url": format!("https://mock.test/pay/{}", request.reference),
                }
            }),
        })
    }

    async fn verify_charge(&self, reference: &str) -> Result<GatewayResponse, CoreError> {
        Ok(GatewayResponse {
            success: self.behavior != "ALWAYS_FAILURE",
            reference: Some(reference.to_string()),
            raw: json!({"status": true, "data": {"reference": reference}}),
        })
    }

    async fn resolve_bank_account(
        &self,
        account_number: &str,
        _bank_code: &str,
    ) -> Result<GatewayResponse, CoreError> {
        Ok(GatewayResponse {
            success: true,
            reference: None,
            raw: json!({
                "status": true,
                "data": {
                    "account_number": account_number,
                    "account_name": "MOCK ACCOUNT",
                }
            }),
        })
    }

    async fn initiate_transfer(
        &self,
        request: &TransferRequest,
    ) -> Result<GatewayResponse, CoreError> {
        Ok(GatewayResponse {
            success: self.behavior != "ALWAYS_FAILURE",
            reference: Some(request.reference.clone()),
            raw: json!({"status": true, "data": {"reference": request.reference}}),
        })
    }
}
