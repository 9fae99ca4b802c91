use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy)]
pub struct BalanceRow {
    pub available: Decimal,
    pub pending: Decimal,
}

/// Funds move between two buckets: `available` (spendable) and `pending`
/// (held for an in-flight withdrawal). Every mutation happens on a row
/// locked with FOR UPDATE inside the caller's transaction; the non-negative
/// CHECK constraints are the last line of defense.
#[derive(Clone)]
pub struct BalancesRepo {
    pub pool: PgPool,
}

impl BalancesRepo {
    pub async fn lock_tx(
        tx: &mut Transaction<'_, Postgres>,
        owner_id: Uuid,
    ) -> Result<BalanceRow, CoreError> {
        sqlx::query("INSERT INTO balances (owner_id) VALUES ($1) ON CONFLICT (owner_id) DO NOTHING")
            .bind(owner_id)
            .execute(tx.as_mut())
            .await?;
        let row = sqlx::query(
            "SELECT available, pending FROM balances WHERE owner_id = $1 FOR UPDATE",
        )
        .bind(owner_id)
        .fetch_one(tx.as_mut())
        .await?;
        Ok(BalanceRow {
            available: row.get("available"),
            pending: row.get("pending"),
        })
    }

    pub async fn credit_available_tx(
        tx: &mut Transaction<'_, Postgres>,
        owner_id: Uuid,
        amount: Decimal,
    ) -> Result<(), CoreError> {
        sqlx::query(
            "UPDATE balances SET available = available + $2, updated_at = $3 WHERE owner_id = $1",
        )
        .bind(owner_id)
        .bind(amount)
        .bind(Utc::now())
        .execute(tx.as_mut())
        .await?;
        Ok(())
    }

    /// available -> pending
    pub async fn hold_tx(
        tx: &mut Transaction<'_, Postgres>,
        owner_id: Uuid,
        amount: Decimal,
    ) -> Result<(), CoreError> {
        sqlx::query(
            "UPDATE balances SET available = available - $2, pending = pending + $2, updated_at = $3 WHERE owner_id = $1",
        )
        .bind(owner_id)
        .bind(amount)
        .bind(Utc::now())
        .execute(tx.as_mut())
        .await?;
        Ok(())
    }

    /// pending -> gone (funds left the platform)
    pub async fn settle_tx(
        tx: &mut Transaction<'_, Postgres>,
        owner_id: Uuid,
        amount: Decimal,
    ) -> Result<(), CoreError> {
        sqlx::query(
            "UPDATE balances SET pending = pending - $2, updated_at = $3 WHERE owner_id = $1",
        )
        .bind(owner_id)
        .bind(amount)
        .bind(Utc::now())
        .execute(tx.as_mut())
        .await?;
        Ok(())
    }

    /// pending -> available
    pub async fn release_tx(
        tx: &mut Transaction<'_, Postgres>,
        owner_id: Uuid,
        amount: Decimal,
    ) -> Result<(), CoreError> {
        sqlx::query(
            "UPDATE balances SET pending = pending - $2, available = available + $2, updated_at = $3 WHERE owner_id = $1",
        )
        .bind(owner_id)
        .bind(amount)
        .bind(Utc::now())
        .execute(tx.as_mut())
        .await?;
        Ok(())
    }

    pub async fn get(&self, owner_id: Uuid) -> Result<BalanceRow, CoreError> {
        let row = sqlx::query("SELECT available, pending FROM balances WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(row) => BalanceRow {
                available: row.get("available"),
                pending: row.get("pending"),
            },
            None => BalanceRow {
                available: Decimal::ZERO,
                pending: Decimal::ZERO,
            },
        })
    }
}
