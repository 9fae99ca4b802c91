use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use sha2::Sha512;
use subtle::ConstantTimeEq;

use crate::error::CoreError;
use crate::gateways::{
    amount_from_minor, map_outbound_error, CanonicalEvent, CanonicalEventKind, ChargeRequest,
    GatewayAdapter, GatewayResponse, TransferRequest,
};

type HmacSha512 = Hmac<Sha512>;

/// Paystack event mapping table:
///
/// | provider event     | canonical           |
/// |--------------------|---------------------|
/// | charge.success     | charge_completed    |
/// | charge.failed      | charge_failed       |
/// | transfer.success   | transfer_completed  |
/// | transfer.failed    | transfer_failed     |
/// | transfer.reversed  | transfer_failed     |
pub struct PaystackAdapter {
    pub base_url: String,
    pub secret_key: String,
    pub timeout_ms: u64,
    pub client: reqwest::Client,
}

impl PaystackAdapter {
    fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }

    fn normalize_response(&self, body: Value) -> GatewayResponse {
        let success = body.get("status").and_then(Value::as_bool).unwrap_or(false);
        let reference = body
            .pointer("/data/reference")
            .or_else(|| body.pointer("/data/transfer_code"))
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
            .map_err(|e| map_outbound_error("paystack", e))?;

        let body: Value = resp
            .json()
            .await
            .map_err(|e| map_outbound_error("paystack", e))?;
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
            .map_err(|e| map_outbound_error("paystack", e))?;

        let body: Value = resp
            .json()
            .await
            .map_err(|e| map_outbound_error("paystack", e))?;
        Ok(self.normalize_response(body))
    }
}

#[async_trait::async_trait]
impl GatewayAdapter for PaystackAdapter {
    fn name(&self) -> &'static str {
        "paystack"
    }

    fn signature_header(&self) -> &'static str {
        "x-paystack-signature"
    }

    fn verify_signature(&self, raw_body: &[u8], signature_header: &str) -> bool {
        let mut mac = match HmacSha512::new_from_slice(self.secret_key.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return false,
        };
        mac.update(raw_body);
        let expected = hex::encode(mac.finalize().into_bytes());

        let provided = signature_header.as_bytes();
        let expected = expected.as_bytes();
        if provided.len() != expected.len() {
            return false;
        }
        provided.ct_eq(expected).into()
    }

    fn extract_event_id(&self, payload: &Value) -> Option<String> {
        payload
            .pointer("/data/reference")
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
            "charge.success" => CanonicalEventKind::ChargeCompleted,
            "charge.failed" => CanonicalEventKind::ChargeFailed,
            "transfer.success" => CanonicalEventKind::TransferCompleted,
            "transfer.failed" | "transfer.reversed" => CanonicalEventKind::TransferFailed,
            other => {
                return Err(CoreError::business(
                    "UNSUPPORTED_EVENT",
                    format!("paystack event {other} has no canonical mapping"),
                ))
            }
        };

        let reference = payload
            .pointer("/data/reference")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::MalformedInput("missing data.reference".to_string()))?
            .to_string();

        // Paystack amounts arrive in kobo.
        let amount: Option<Decimal> = payload
            .pointer("/data/amount")
            .and_then(Value::as_i64)
            .map(amount_from_minor);

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
        let minor = (request.amount * Decimal::ONE_HUNDRED).trunc();
        self.post(
            "/transaction/initialize",
            json!({
                "reference": request.reference,
                "amount": minor.to_string(),
                "currency": request.currency,
                "email": request.customer_email,
            }),
        )
        .await
    }

    async fn verify_charge(&self, reference: &str) -> Result<GatewayResponse, CoreError> {
        self.get(&format!("/transaction/verify/{reference}")).await
    }

    async fn resolve_bank_account(
        &self,
        account_number: &str,
        bank_code: &str,
    ) -> Result<GatewayResponse, CoreError> {
        self.get(&format!(
            "/bank/resolve?account_number={account_number}&bank_code={bank_code}"
        ))
        .await
    }

    async fn initiate_transfer(
        &self,
        request: &TransferRequest,
    ) -> Result<GatewayResponse, CoreError> {
        let minor = (request.amount * Decimal::ONE_HUNDRED).trunc();
        self.post(
            "/transfer",
            json!({
                "source": "balance",
                "reference": request.reference,
                "amount": minor.to_string(),
                "currency": request.currency,
                "recipient": {
                    "account_number": request.account_number,
                    "bank_code": request.bank_code,
                },
                "reason": request.narration,
            }),
        )
        .await
    }
}
