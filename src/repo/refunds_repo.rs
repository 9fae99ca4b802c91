use chrono::Utc;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::domain::refund::{Refund, RefundReason, RefundStatus};
use crate::error::CoreError;

#[derive(Clone)]
pub struct RefundsRepo {
    pub pool: PgPool,
}

fn map_refund(row: &sqlx::postgres::PgRow) -> Result<Refund, CoreError> {
    let status: String = row.get("status");
    let reason: String = row.get("reason");
    Ok(Refund {
        id: row.get("id"),
        order_id: row.get("order_id"),
        payment_id: row.get("payment_id"),
        amount: row.get("amount"),
        currency: row.get("currency"),
        reason: RefundReason::parse(&reason)
            .ok_or_else(|| CoreError::Internal(anyhow::anyhow!("unknown refund reason {reason}")))?,
        reference: row.get("reference"),
        gateway_refund_id: row.get("gateway_refund_id"),
        status: RefundStatus::parse(&status)
            .ok_or_else(|| CoreError::Internal(anyhow::anyhow!("unknown refund status {status}")))?,
        retry_count: row.get("retry_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

impl RefundsRepo {
    pub async fn insert_tx(
        tx: &mut Transaction<'_, Postgres>,
        refund: &Refund,
    ) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO refunds (id, order_id, payment_id, amount, currency, reason, reference, status, retry_count, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(refund.id)
        .bind(refund.order_id)
        .bind(refund.payment_id)
        .bind(refund.amount)
        .bind(&refund.currency)
        .bind(refund.reason.as_str())
        .bind(&refund.reference)
        .bind(refund.status.as_str())
        .bind(refund.retry_count)
        .bind(refund.created_at)
        .execute(tx.as_mut())
        .await?;
        Ok(())
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<Refund>, CoreError> {
        let row = sqlx::query("SELECT * FROM refunds WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_refund).transpose()
    }

    pub async fn find_by_reference_for_update_tx(
        tx: &mut Transaction<'_, Postgres>,
        reference: &str,
    ) -> Result<Option<Refund>, CoreError> {
        let row = sqlx::query("SELECT * FROM refunds WHERE reference = $1 FOR UPDATE")
            .bind(reference)
            .fetch_optional(tx.as_mut())
            .await?;
        row.as_ref().map(map_refund).transpose()
    }

    pub async fn find_for_update_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Option<Refund>, CoreError> {
        let row = sqlx::query("SELECT * FROM refunds WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(tx.as_mut())
            .await?;
        row.as_ref().map(map_refund).transpose()
    }

    pub async fn update_status_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        status: RefundStatus,
        gateway_refund_id: Option<&str>,
    ) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            UPDATE refunds
            SET status = $2,
                gateway_refund_id = COALESCE($3, gateway_refund_id),
                updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(gateway_refund_id)
        .bind(Utc::now())
        .execute(tx.as_mut())
        .await?;
        Ok(())
    }

    pub async fn increment_retry_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<i32, CoreError> {
        let row = sqlx::query(
            "UPDATE refunds SET retry_count = retry_count + 1 WHERE id = $1 RETURNING retry_count",
        )
        .bind(id)
        .fetch_one(tx.as_mut())
        .await?;
        Ok(row.get("retry_count"))
    }
}
