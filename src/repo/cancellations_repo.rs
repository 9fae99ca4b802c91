use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::domain::cancellation::{BookingCancellation, CancellationReason, CancellationStatus};
use crate::domain::refund::RefundStatus;
use crate::error::CoreError;

#[derive(Clone)]
pub struct CancellationsRepo {
    pub pool: PgPool,
}

fn map_cancellation(row: &sqlx::postgres::PgRow) -> Result<BookingCancellation, CoreError> {
    let status: String = row.get("status");
    let refund_status: String = row.get("refund_status");
    let reason: String = row.get("reason");
    Ok(BookingCancellation {
        id: row.get("id"),
        booking_id: row.get("booking_id"),
        reason: CancellationReason::parse(&reason).ok_or_else(|| {
            CoreError::Internal(anyhow::anyhow!("unknown cancellation reason {reason}"))
        })?,
        feedback: row.get("feedback"),
        would_rebook: row.get("would_rebook"),
        hours_until_checkin: row.get("hours_until_checkin"),
        refund_percentage: row.get("refund_percentage"),
        refund_amount: row.get("refund_amount"),
        penalty_amount: row.get("penalty_amount"),
        status: CancellationStatus::parse(&status).ok_or_else(|| {
            CoreError::Internal(anyhow::anyhow!("unknown cancellation status {status}"))
        })?,
        refund_status: RefundStatus::parse(&refund_status).ok_or_else(|| {
            CoreError::Internal(anyhow::anyhow!("unknown refund status {refund_status}"))
        })?,
        refund_id: row.get("refund_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

impl CancellationsRepo {
    /// Returns false when the booking already has a cancellation row.
    pub async fn insert_tx(
        tx: &mut Transaction<'_, Postgres>,
        cancellation: &BookingCancellation,
    ) -> Result<bool, CoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO booking_cancellations
                (id, booking_id, reason, feedback, would_rebook, hours_until_checkin,
                 refund_percentage, refund_amount, penalty_amount, status, refund_status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (booking_id) DO NOTHING
            "#,
        )
        .bind(cancellation.id)
        .bind(cancellation.booking_id)
        .bind(cancellation.reason.as_str())
        .bind(&cancellation.feedback)
        .bind(cancellation.would_rebook)
        .bind(cancellation.hours_until_checkin)
        .bind(cancellation.refund_percentage)
        .bind(cancellation.refund_amount)
        .bind(cancellation.penalty_amount)
        .bind(cancellation.status.as_str())
        .bind(cancellation.refund_status.as_str())
        .bind(cancellation.created_at)
        .execute(tx.as_mut())
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<BookingCancellation>, CoreError> {
        let row = sqlx::query("SELECT * FROM booking_cancellations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_cancellation).transpose()
    }

    pub async fn find_by_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<BookingCancellation>, CoreError> {
        let row = sqlx::query("SELECT * FROM booking_cancellations WHERE booking_id = $1")
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_cancellation).transpose()
    }

    pub async fn find_for_update_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Option<BookingCancellation>, CoreError> {
        let row = sqlx::query("SELECT * FROM booking_cancellations WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(tx.as_mut())
            .await?;
        row.as_ref().map(map_cancellation).transpose()
    }

    pub async fn find_by_refund_for_update_tx(
        tx: &mut Transaction<'_, Postgres>,
        refund_id: Uuid,
    ) -> Result<Option<BookingCancellation>, CoreError> {
        let row = sqlx::query("SELECT * FROM booking_cancellations WHERE refund_id = $1 FOR UPDATE")
            .bind(refund_id)
            .fetch_optional(tx.as_mut())
            .await?;
        row.as_ref().map(map_cancellation).transpose()
    }

    pub async fn set_refund_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        refund_id: Uuid,
    ) -> Result<(), CoreError> {
        sqlx::query("UPDATE booking_cancellations SET refund_id = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(refund_id)
            .execute(tx.as_mut())
            .await?;
        Ok(())
    }

    pub async fn update_status_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        status: CancellationStatus,
    ) -> Result<(), CoreError> {
        sqlx::query("UPDATE booking_cancellations SET status = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(tx.as_mut())
            .await?;
        Ok(())
    }

    pub async fn update_refund_status_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        refund_status: RefundStatus,
    ) -> Result<(), CoreError> {
        sqlx::query("UPDATE booking_cancellations SET refund_status = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(refund_status.as_str())
            .execute(tx.as_mut())
            .await?;
        Ok(())
    }
}
