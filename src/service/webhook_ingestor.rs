use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use crate::bus::EventBus;
use crate::domain::event::{event_types, DomainEvent};
use crate::error::CoreError;
use crate::gateways::{CanonicalEventKind, GatewayRegistry};
use crate::repo::webhooks_repo::WebhooksRepo;
use crate::service::cancellation_service::CancellationService;
use crate::service::payment_flow::PaymentFlowService;
use crate::service::withdrawal_workflow::WithdrawalWorkflow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Processed { webhook_id: Uuid },
    /// Another delivery already owns this event id. Not an error; the
    /// provider gets a 200 so it stops retrying.
    Duplicate,
}

/// Front door for provider webhooks: dedupe, verify, normalize, route.
/// The receipt row is claimed before verification so every delivery with an
/// identity is auditable; failures mark it failed so the provider's retry
/// can take it over.
pub struct WebhookIngestor {
    pub webhooks: WebhooksRepo,
    pub registry: GatewayRegistry,
    pub bus: EventBus,
    pub payments: Arc<PaymentFlowService>,
    pub cancellations: Arc<CancellationService>,
    pub withdrawals: Arc<WithdrawalWorkflow>,
}

impl WebhookIngestor {
    pub async fn ingest(
        &self,
        provider: &str,
        signature: &str,
        raw_body: &[u8],
    ) -> Result<IngestOutcome, CoreError> {
        let adapter = self.registry.require(provider)?;

        // Malformed bytes carry no identity to dedupe on: no durable receipt.
        let payload: serde_json::Value = serde_json::from_slice(raw_body)
            .map_err(|e| CoreError::MalformedInput(format!("invalid JSON payload: {e}")))?;

        // No stable identity means no dedupe key; reject rather than invent one.
        let event_id = adapter
            .extract_event_id(&payload)
            .ok_or_else(|| CoreError::MalformedInput("payload carries no event id".to_string()))?;

        // The receipt is claimed before verification so rejected calls are
        // auditable; a forged delivery marked failed is taken over by the
        // provider's genuine retry.
        let webhook_id = match self
            .webhooks
            .begin_receipt(provider, &event_id, raw_body)
            .await?
        {
            Some(id) => id,
            None => {
                tracing::info!(provider, event_id, "duplicate webhook delivery");
                return Ok(IngestOutcome::Duplicate);
            }
        };

        if !adapter.verify_signature(raw_body, signature) {
            tracing::warn!(provider, event_id, "webhook signature rejected");
            self.webhooks
                .mark_failed(webhook_id, "invalid signature")
                .await?;
            return Err(CoreError::SignatureInvalid);
        }

        let normalized = adapter.normalize_event(&payload);
        let event_type = normalized
            .as_ref()
            .map(|e| e.kind.as_str())
            .unwrap_or("unknown");

        match self.apply(provider, normalized).await {
            Ok(()) => {
                self.webhooks.mark_processed(webhook_id).await?;
                self.bus
                    .publish(DomainEvent::new(
                        event_types::WEBHOOK_RECEIVED,
                        "webhook_ingestor",
                        json!({
                            "provider": provider,
                            "event_type": event_type,
                            "event_id": event_id,
                            "webhook_id": webhook_id,
                            "success": true,
                        }),
                    ))
                    .await;
                Ok(IngestOutcome::Processed { webhook_id })
            }
            Err(err) => {
                self.webhooks
                    .mark_failed(webhook_id, &err.to_string())
                    .await?;
                Err(err)
            }
        }
    }

    async fn apply(
        &self,
        provider: &str,
        normalized: Result<crate::gateways::CanonicalEvent, CoreError>,
    ) -> Result<(), CoreError> {
        let event = normalized?;
        tracing::info!(
            provider,
            kind = event.kind.as_str(),
            reference = %event.reference,
            "webhook accepted"
        );

        match event.kind {
            CanonicalEventKind::ChargeCompleted => self.payments.complete_charge(&event).await,
            CanonicalEventKind::ChargeFailed => self.payments.fail_charge(&event).await,
            // Transfer references are disjoint (wdl_ vs rfd_), so route to
            // withdrawals first and fall back to refunds on NotFound.
            CanonicalEventKind::TransferCompleted => {
                match self.withdrawals.complete_transfer(&event).await {
                    Err(CoreError::NotFound(_)) => {
                        self.cancellations.complete_refund(&event).await
                    }
                    other => other,
                }
            }
            CanonicalEventKind::TransferFailed => {
                match self.withdrawals.fail_transfer(&event).await {
                    Err(CoreError::NotFound(_)) => self.cancellations.fail_refund(&event).await,
                    other => other,
                }
            }
        }
    }
}
