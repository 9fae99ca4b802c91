use chrono::Utc;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::CoreError;

#[derive(Clone)]
pub struct WebhooksRepo {
    pub pool: PgPool,
}

impl WebhooksRepo {
    /// Claims a receipt for (provider, event_id). Returns the receipt id if
    /// this delivery should be processed, None if an earlier delivery already
    /// owns it. A receipt whose processing previously failed is re-armed so
    /// the provider's retry can take it over, as is a pending receipt old
    /// enough that its claimant must have died mid-processing (a forged
    /// delivery can hold the claim briefly, but not forever).
    pub async fn begin_receipt(
        &self,
        provider: &str,
        gateway_event_id: &str,
        raw_payload: &[u8],
    ) -> Result<Option<Uuid>, CoreError> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO payment_webhooks (id, provider, gateway_event_id, raw_payload, status, received_at)
            VALUES ($1, $2, $3, $4, 'pending', $5)
            ON CONFLICT (provider, gateway_event_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(provider)
        .bind(gateway_event_id)
        .bind(raw_payload)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return Ok(Some(row.get("id")));
        }

        let retaken = sqlx::query(
            r#"
            UPDATE payment_webhooks
            SET status = 'pending', error_message = NULL, processed_at = NULL
            WHERE provider = $1 AND gateway_event_id = $2
              AND (status = 'failed'
                   OR (status = 'pending' AND received_at < now() - interval '5 minutes'))
            RETURNING id
            "#,
        )
        .bind(provider)
        .bind(gateway_event_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(retaken.map(|row| row.get("id")))
    }

    pub async fn mark_processed(&self, id: Uuid) -> Result<(), CoreError> {
        sqlx::query(
            "UPDATE payment_webhooks SET status = 'processed', processed_at = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), CoreError> {
        sqlx::query(
            "UPDATE payment_webhooks SET status = 'failed', error_message = $2, processed_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
