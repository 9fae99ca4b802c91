use rust_decimal::Decimal;
use serde_json::{json, Value};
use subtle::ConstantTimeEq;

use crate::error::CoreError;
use crate::gateways::{
    map_outbound_error, CanonicalEvent, CanonicalEventKind, ChargeRequest, GatewayAdapter,
    GatewayResponse, TransferRequest,
};

/// Flutterwave event mapping table:
///
/// | provider event            | canonical           |
/// |---------------------------|---------------------|
/// | charge.completed (ok)     | charge_completed    |
/// | charge.completed (failed) | charge_failed       |
/// | BANK_TRANSFER_TRANSACTION | charge_completed    |
/// | transfer.completed (ok)   | transfer_completed  |
/// | transfer.completed (else) | transfer_failed     |
///
/// BANK_TRANSFER_TRANSACTION is the provider's "bank transfer received"
/// notification; its effect is indistinguishable from a successful charge,
/// so it maps to charge_completed. This is a fixed per-provider rule, not
/// inferred at call time.
pub struct FlutterwaveAdapter {
    pub base_url: String,
    pub secret_key: String,
    /// Value we configured with the provider for the verif-hash header.
    pub verif_hash: String,
    pub timeout_ms: u64,
    pub client: reqwest::Client,
}

impl FlutterwaveAdapter {
    fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }

    fn normalize_response(&self, body: Value) -> GatewayResponse {
        let success = body
            .get("status")
            .and_then(Value::as_str)
            .map(|s| s == "success")
            .unwrap_or(false);
        let reference = body
            .pointer("/data/tx_ref")
            .or_else(|| body.pointer("/data/reference"))
            .and_then(Value::as_str)
            .map(ToString::to_string);
        GatewayResponse {
            success,
            reference,
            raw: body,
        }
    }

    async fn post(&self, path: &str, body: Value) -> Result<GatewayResponse, CoreError> {
        let resp = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.secret_key)
            .json(&body)
            .timeout(self.timeout())
            .send()
            .await
            .map_err(|e| map_outbound_error("flutterwave", e))?;

        let body: Value = resp
            .json()
            .await
            .map_err(|e| map_outbound_error("flutterwave", e))?;
        Ok(self.normalize_response(body))
    }

    async fn get(&self, path: &str) -> Result<GatewayResponse, CoreError> {
        let resp = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.secret_key)
            .timeout(self.timeout())
            .send()
            .await
            .map_err(|e| map_outbound_error("flutterwave", e))?;

        let body: Value = resp
            .json()
            .await
            .map_err(|e| map_outbound_error("flutterwave", e))?;
        Ok(self.normalize_response(body))
    }

    fn data_status_successful(payload: &Value) -> bool {
        payload
            .pointer("/data/status")
            .and_then(Value::as_str)
            .map(|s| s.eq_ignore_ascii_case("successful"))
            .unwrap_or(false)
    }
}

#[async_trait::async_trait]
impl GatewayAdapter for FlutterwaveAdapter {
    fn name(&self) -> &'static str {
        "flutterwave"
    }

    fn signature_header(&self) -> &'static str {
        "verif-hash"
    }

    fn verify_signature(&self, _raw_body: &[u8], signature_header: &str) -> bool {
        // Flutterwave sends the configured secret hash verbatim rather
        // than a digest of the body.
        let provided = signature_header.as_bytes();
        let expected = self.verif_hash.as_bytes();
        if self.verif_hash.is_empty() || provided.len() != expected.len() {
            return false;
        }
        provided.ct_eq(expected).into()
    }

    fn extract_event_id(&self, payload: &Value) -> Option<String> {
        payload
            .pointer("/data/tx_ref")
            .or_else(|| payload.pointer("/data/reference"))
            .or_else(|| payload.pointer("/data/flw_ref"))
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .or_else(|| {
                payload
                    .pointer("/data/id")
                    .and_then(Value::as_i64)
                    .map(|id| id.to_string())
            })
    }

    fn normalize_event(&self, payload: &Value) -> Result<CanonicalEvent, CoreError> {
        let event = payload
            .get("event")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::MalformedInput("missing event field".to_string()))?;

        let kind = match event {
            "charge.completed" => {
                if Self::data_status_successful(payload) {
                    CanonicalEventKind::ChargeCompleted
                } else {
                    CanonicalEventKind::ChargeFailed
                }
            }
            "BANK_TRANSFER_TRANSACTION" => CanonicalEventKind::ChargeCompleted,
            "transfer.completed" => {
                if Self::data_status_successful(payload) {
                    CanonicalEventKind::TransferCompleted
                } else {
                    CanonicalEventKind::TransferFailed
                }
            }
            other => {
                return Err(CoreError::business(
                    "UNSUPPORTED_EVENT",
                    format!("flutterwave event {other} has no canonical mapping"),
                ))
            }
        };

        let reference = payload
            .pointer("/data/tx_ref")
            .or_else(|| payload.pointer("/data/reference"))
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::MalformedInput("missing data.tx_ref".to_string()))?
            .to_string();

        // Flutterwave amounts are major units, possibly fractional.
        let amount: Option<Decimal> = payload
            .pointer("/data/amount")
            .and_then(Value::as_f64)
            .and_then(Decimal::from_f64_retain)
            .map(|d| d.round_dp(2));

        Ok(CanonicalEvent {
            kind,
            reference,
            gateway_transaction_id: payload
                .pointer("/data/id")
                .and_then(Value::as_i64)
                .map(|id| id.to_string()),
            amount,
            currency: payload
                .pointer("/data/currency")
                .and_then(Value::as_str)
                .map(ToString::to_string),
            raw: payload.clone(),
        })
    }

    async fn initiate_charge(&self, request: &ChargeRequest) -> Result<GatewayResponse, CoreError> {
        self.post(
            "/v3/payments",
            json!({
                "tx_ref": request.reference,
                "amount": request.amount.to_string(),
                "currency": request.currency,
                "customer": { "email": request.customer_email },
            }),
        )
        .await
    }

    async fn verify_charge(&self, reference: &str) -> Result<GatewayResponse, CoreError> {
        self.get(&format!(
            "/v3/transactions/verify_by_reference?tx_ref={reference}"
        ))
        .await
    }

    async fn resolve_bank_account(
        &self,
        account_number: &str,
        bank_code: &str,
    ) -> Result<GatewayResponse, CoreError> {
        self.post(
            "/v3/accounts/resolve",
            json!({
                "account_number": account_number,
                "account_bank": bank_code,
            }),
        )
        .await
    }

    async fn initiate_transfer(
        &self,
        request: &TransferRequest,
    ) -> Result<GatewayResponse, CoreError> {
        self.post(
            "/v3/transfers",
            json!({
                "reference": request.reference,
                "amount": request.amount.to_string(),
                "currency": request.currency,
                "account_number": request.account_number,
                "account_bank": request.bank_code,
                "narration": request.narration,
            }),
        )
        .await
    }
}
