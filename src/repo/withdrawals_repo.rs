use chrono::Utc;
use serde_json::Value;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::domain::withdrawal::{
    Withdrawal, WithdrawalLogEntry, WithdrawalStatus, WithdrawalType,
};
use crate::error::CoreError;

#[derive(Clone)]
pub struct WithdrawalsRepo {
    pub pool: PgPool,
}

fn parse_status(s: &str) -> Result<WithdrawalStatus, CoreError> {
    WithdrawalStatus::parse(s)
        .ok_or_else(|| CoreError::Internal(anyhow::anyhow!("unknown withdrawal status {s}")))
}

fn map_withdrawal(row: &sqlx::postgres::PgRow) -> Result<Withdrawal, CoreError> {
    let status: String = row.get("status");
    let withdrawal_type: String = row.get("withdrawal_type");
    Ok(Withdrawal {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        bank_account_id: row.get("bank_account_id"),
        amount: row.get("amount"),
        currency: row.get("currency"),
        withdrawal_type: WithdrawalType::parse(&withdrawal_type).ok_or_else(|| {
            CoreError::Internal(anyhow::anyhow!("unknown withdrawal type {withdrawal_type}"))
        })?,
        status: parse_status(&status)?,
        reference: row.get("reference"),
        gateway_transaction_id: row.get("gateway_transaction_id"),
        approved_by: row.get("approved_by"),
        processed_by: row.get("processed_by"),
        retry_count: row.get("retry_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn map_log(row: &sqlx::postgres::PgRow) -> Result<WithdrawalLogEntry, CoreError> {
    let prior: Option<String> = row.get("prior_status");
    let next: String = row.get("next_status");
    Ok(WithdrawalLogEntry {
        id: row.get("id"),
        withdrawal_id: row.get("withdrawal_id"),
        actor: row.get("actor"),
        prior_status: prior.as_deref().map(parse_status).transpose()?,
        next_status: parse_status(&next)?,
        metadata: row.get("metadata"),
        created_at: row.get("created_at"),
    })
}

impl WithdrawalsRepo {
    pub async fn insert_tx(
        tx: &mut Transaction<'_, Postgres>,
        withdrawal: &Withdrawal,
    ) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO withdrawals
                (id, owner_id, bank_account_id, amount, currency, withdrawal_type,
                 status, reference, retry_count, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            "#,
        )
        .bind(withdrawal.id)
        .bind(withdrawal.owner_id)
        .bind(withdrawal.bank_account_id)
        .bind(withdrawal.amount)
        .bind(&withdrawal.currency)
        .bind(withdrawal.withdrawal_type.as_str())
        .bind(withdrawal.status.as_str())
        .bind(&withdrawal.reference)
        .bind(withdrawal.retry_count)
        .bind(withdrawal.created_at)
        .execute(tx.as_mut())
        .await?;
        Ok(())
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<Withdrawal>, CoreError> {
        let row = sqlx::query("SELECT * FROM withdrawals WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_withdrawal).transpose()
    }

    pub async fn find_for_update_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Option<Withdrawal>, CoreError> {
        let row = sqlx::query("SELECT * FROM withdrawals WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(tx.as_mut())
            .await?;
        row.as_ref().map(map_withdrawal).transpose()
    }

    pub async fn find_by_reference_for_update_tx(
        tx: &mut Transaction<'_, Postgres>,
        reference: &str,
    ) -> Result<Option<Withdrawal>, CoreError> {
        let row = sqlx::query("SELECT * FROM withdrawals WHERE reference = $1 FOR UPDATE")
            .bind(reference)
            .fetch_optional(tx.as_mut())
            .await?;
        row.as_ref().map(map_withdrawal).transpose()
    }

    pub async fn update_status_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        status: WithdrawalStatus,
    ) -> Result<(), CoreError> {
        sqlx::query("UPDATE withdrawals SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .bind(Utc::now())
            .execute(tx.as_mut())
            .await?;
        Ok(())
    }

    pub async fn set_approver_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        approved_by: Uuid,
    ) -> Result<(), CoreError> {
        sqlx::query("UPDATE withdrawals SET approved_by = $2 WHERE id = $1")
            .bind(id)
            .bind(approved_by)
            .execute(tx.as_mut())
            .await?;
        Ok(())
    }

    pub async fn set_processor_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        processed_by: Uuid,
    ) -> Result<(), CoreError> {
        sqlx::query("UPDATE withdrawals SET processed_by = $2 WHERE id = $1")
            .bind(id)
            .bind(processed_by)
            .execute(tx.as_mut())
            .await?;
        Ok(())
    }

    pub async fn set_gateway_transaction_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        gateway_transaction_id: &str,
    ) -> Result<(), CoreError> {
        sqlx::query("UPDATE withdrawals SET gateway_transaction_id = $2 WHERE id = $1")
            .bind(id)
            .bind(gateway_transaction_id)
            .execute(tx.as_mut())
            .await?;
        Ok(())
    }

    pub async fn increment_retry_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<i32, CoreError> {
        let row = sqlx::query(
            "UPDATE withdrawals SET retry_count = retry_count + 1 WHERE id = $1 RETURNING retry_count",
        )
        .bind(id)
        .fetch_one(tx.as_mut())
        .await?;
        Ok(row.get("retry_count"))
    }

    pub async fn append_log_tx(
        tx: &mut Transaction<'_, Postgres>,
        withdrawal_id: Uuid,
        actor: &str,
        prior_status: Option<WithdrawalStatus>,
        next_status: WithdrawalStatus,
        metadata: Value,
    ) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO withdrawal_logs (withdrawal_id, actor, prior_status, next_status, metadata)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(withdrawal_id)
        .bind(actor)
        .bind(prior_status.map(|s| s.as_str()))
        .bind(next_status.as_str())
        .bind(metadata)
        .execute(tx.as_mut())
        .await?;
        Ok(())
    }

    pub async fn list_logs(
        &self,
        withdrawal_id: Uuid,
    ) -> Result<Vec<WithdrawalLogEntry>, CoreError> {
        let rows = sqlx::query(
            "SELECT * FROM withdrawal_logs WHERE withdrawal_id = $1 ORDER BY id",
        )
        .bind(withdrawal_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_log).collect()
    }
}
