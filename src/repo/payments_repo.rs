use chrono::Utc;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::domain::payment::{Payment, PaymentStatus};
use crate::error::CoreError;

#[derive(Clone)]
pub struct PaymentsRepo {
    pub pool: PgPool,
}

fn parse_status(s: &str) -> Result<PaymentStatus, CoreError> {
    PaymentStatus::parse(s)
        .ok_or_else(|| CoreError::Internal(anyhow::anyhow!("unknown payment status {s}")))
}

fn map_payment(row: &sqlx::postgres::PgRow) -> Result<Payment, CoreError> {
    let status: String = row.get("status");
    Ok(Payment {
        id: row.get("id"),
        order_id: row.get("order_id"),
        amount: row.get("amount"),
        currency: row.get("currency"),
        provider: row.get("provider"),
        reference: row.get("reference"),
        gateway_transaction_id: row.get("gateway_transaction_id"),
        status: parse_status(&status)?,
        attempt: row.get("attempt"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

impl PaymentsRepo {
    pub async fn insert_tx(
        tx: &mut Transaction<'_, Postgres>,
        payment: &Payment,
    ) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO payments (id, order_id, amount, currency, provider, reference, status, attempt, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(payment.id)
        .bind(payment.order_id)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(&payment.provider)
        .bind(&payment.reference)
        .bind(payment.status.as_str())
        .bind(payment.attempt)
        .bind(payment.created_at)
        .execute(tx.as_mut())
        .await?;
        Ok(())
    }

    pub async fn find_by_reference(&self, reference: &str) -> Result<Option<Payment>, CoreError> {
        let row = sqlx::query("SELECT * FROM payments WHERE reference = $1")
            .bind(reference)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_payment).transpose()
    }

    pub async fn find_by_reference_for_update_tx(
        tx: &mut Transaction<'_, Postgres>,
        reference: &str,
    ) -> Result<Option<Payment>, CoreError> {
        let row = sqlx::query("SELECT * FROM payments WHERE reference = $1 FOR UPDATE")
            .bind(reference)
            .fetch_optional(tx.as_mut())
            .await?;
        row.as_ref().map(map_payment).transpose()
    }

    pub async fn find_for_update_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Option<Payment>, CoreError> {
        let row = sqlx::query("SELECT * FROM payments WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(tx.as_mut())
            .await?;
        row.as_ref().map(map_payment).transpose()
    }

    pub async fn latest_for_order(&self, order_id: Uuid) -> Result<Option<Payment>, CoreError> {
        let row = sqlx::query(
            "SELECT * FROM payments WHERE order_id = $1 ORDER BY attempt DESC LIMIT 1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_payment).transpose()
    }

    pub async fn count_attempts(&self, order_id: Uuid) -> Result<i64, CoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM payments WHERE order_id = $1")
            .bind(order_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("n"))
    }

    pub async fn has_completed_for_order_tx(
        tx: &mut Transaction<'_, Postgres>,
        order_id: Uuid,
        excluding: Uuid,
    ) -> Result<bool, CoreError> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM payments WHERE order_id = $1 AND status = 'completed' AND id <> $2) AS present",
        )
        .bind(order_id)
        .bind(excluding)
        .fetch_one(tx.as_mut())
        .await?;
        Ok(row.get::<bool, _>("present"))
    }

    pub async fn update_status_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        status: PaymentStatus,
        gateway_transaction_id: Option<&str>,
    ) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            UPDATE payments
            SET status = $2,
                gateway_transaction_id = COALESCE($3, gateway_transaction_id),
                updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(gateway_transaction_id)
        .bind(Utc::now())
        .execute(tx.as_mut())
        .await?;
        Ok(())
    }
}
