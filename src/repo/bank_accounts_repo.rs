use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::withdrawal::BankAccount;
use crate::error::CoreError;

#[derive(Clone)]
pub struct BankAccountsRepo {
    pub pool: PgPool,
}

fn map_account(row: &sqlx::postgres::PgRow) -> BankAccount {
    BankAccount {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        account_number: row.get("account_number"),
        bank_code: row.get("bank_code"),
        account_name: row.get("account_name"),
        verified: row.get("verified"),
        is_default: row.get("is_default"),
        created_at: row.get("created_at"),
    }
}

impl BankAccountsRepo {
    pub async fn insert(&self, account: &BankAccount) -> Result<(), CoreError> {
        let mut tx = self.pool.begin().await?;
        if account.is_default {
            sqlx::query("UPDATE bank_accounts SET is_default = false WHERE owner_id = $1")
                .bind(account.owner_id)
                .execute(tx.as_mut())
                .await?;
        }
        sqlx::query(
            r#"
            INSERT INTO bank_accounts (id, owner_id, account_number, bank_code, account_name, verified, is_default, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(account.id)
        .bind(account.owner_id)
        .bind(&account.account_number)
        .bind(&account.bank_code)
        .bind(&account.account_name)
        .bind(account.verified)
        .bind(account.is_default)
        .bind(account.created_at)
        .execute(tx.as_mut())
        .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<BankAccount>, CoreError> {
        let row = sqlx::query("SELECT * FROM bank_accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(map_account))
    }

    pub async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<BankAccount>, CoreError> {
        let rows = sqlx::query(
            "SELECT * FROM bank_accounts WHERE owner_id = $1 ORDER BY created_at",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(map_account).collect())
    }
}
