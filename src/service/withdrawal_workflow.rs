use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::bus::EventBus;
use crate::domain::event::{event_types, DomainEvent};
use crate::domain::withdrawal::{
    RequestWithdrawalRequest, Withdrawal, WithdrawalStatus, MAX_WITHDRAWAL_RETRIES,
};
use crate::error::CoreError;
use crate::gateways::{CanonicalEvent, GatewayRegistry, TransferRequest};
use crate::repo::balances_repo::BalancesRepo;
use crate::repo::bank_accounts_repo::BankAccountsRepo;
use crate::repo::withdrawals_repo::WithdrawalsRepo;
use crate::transitions::withdrawal::WithdrawalEvent;
use crate::transitions::{withdrawal, Step};

/// Approval workflow for moving platform funds to a bank account. Approval
/// places a hold (available -> pending), settlement burns it, and a payout
/// that exhausts its retries releases it back. Every status change appends
/// one audit log row in the same transaction.
pub struct WithdrawalWorkflow {
    pub pool: PgPool,
    pub withdrawals: WithdrawalsRepo,
    pub bank_accounts: BankAccountsRepo,
    pub balances: BalancesRepo,
    pub registry: GatewayRegistry,
    pub payout_provider: String,
    pub bus: EventBus,
}

fn withdrawal_reference() -> String {
    format!("wdl_{}", Uuid::new_v4().simple())
}

impl WithdrawalWorkflow {
    pub async fn request(
        &self,
        req: RequestWithdrawalRequest,
    ) -> Result<Withdrawal, CoreError> {
        if req.amount <= Decimal::ZERO {
            return Err(CoreError::MalformedInput("amount must be positive".to_string()));
        }

        let account = self
            .bank_accounts
            .find(req.bank_account_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("bank account {}", req.bank_account_id)))?;
        if account.owner_id != req.owner_id {
            return Err(CoreError::business(
                "BANK_ACCOUNT_OWNER_MISMATCH",
                "bank account belongs to another owner",
            ));
        }
        if !account.verified {
            return Err(CoreError::business(
                "BANK_ACCOUNT_UNVERIFIED",
                "bank account has not been verified",
            ));
        }

        let balance = self.balances.get(req.owner_id).await?;
        if balance.available < req.amount {
            return Err(CoreError::business(
                "INSUFFICIENT_FUNDS",
                format!("available {} is below {}", balance.available, req.amount),
            ));
        }

        let now = Utc::now();
        let withdrawal_row = Withdrawal {
            id: Uuid::new_v4(),
            owner_id: req.owner_id,
            bank_account_id: req.bank_account_id,
            amount: req.amount,
            currency: req.currency,
            withdrawal_type: req.withdrawal_type,
            status: WithdrawalStatus::Pending,
            reference: withdrawal_reference(),
            gateway_transaction_id: None,
            approved_by: None,
            processed_by: None,
            retry_count: 0,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.pool.begin().await?;
        WithdrawalsRepo::insert_tx(&mut tx, &withdrawal_row).await?;
        WithdrawalsRepo::append_log_tx(
            &mut tx,
            withdrawal_row.id,
            &format!("owner:{}", req.owner_id),
            None,
            WithdrawalStatus::Pending,
            json!({"amount": withdrawal_row.amount.to_string()}),
        )
        .await?;
        tx.commit().await?;

        self.bus
            .publish(DomainEvent::new(
                event_types::WITHDRAWAL_REQUESTED,
                "withdrawal",
                json!({
                    "withdrawal_id": withdrawal_row.id,
                    "owner_id": withdrawal_row.owner_id,
                    "amount": withdrawal_row.amount.to_string(),
                }),
            ))
            .await;

        Ok(withdrawal_row)
    }

    /// Approval re-checks the balance under lock and moves the amount to
    /// pending. The hold and the status change commit together.
    pub async fn approve(&self, id: Uuid, approver: Uuid) -> Result<Withdrawal, CoreError> {
        let mut tx = self.pool.begin().await?;
        let row = WithdrawalsRepo::find_for_update_tx(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("withdrawal {id}")))?;

        let next = match withdrawal::apply(row.status, WithdrawalEvent::Approve)? {
            Step::AlreadyApplied => {
                tx.commit().await?;
                return Ok(row);
            }
            Step::Changed(next) => next,
        };

        let balance = BalancesRepo::lock_tx(&mut tx, row.owner_id).await?;
        if balance.available < row.amount {
            return Err(CoreError::business(
                "INSUFFICIENT_FUNDS",
                format!("available {} is below {}", balance.available, row.amount),
            ));
        }
        BalancesRepo::hold_tx(&mut tx, row.owner_id, row.amount).await?;

        WithdrawalsRepo::update_status_tx(&mut tx, id, next).await?;
        WithdrawalsRepo::set_approver_tx(&mut tx, id, approver).await?;
        WithdrawalsRepo::append_log_tx(
            &mut tx,
            id,
            &format!("admin:{approver}"),
            Some(row.status),
            next,
            json!({"held": row.amount.to_string()}),
        )
        .await?;
        tx.commit().await?;

        self.bus
            .publish(DomainEvent::new(
                event_types::WITHDRAWAL_APPROVED,
                "withdrawal",
                json!({"withdrawal_id": id, "owner_id": row.owner_id}),
            ))
            .await;
        self.reload(id).await
    }

    pub async fn reject(
        &self,
        id: Uuid,
        approver: Uuid,
        reason: Option<String>,
    ) -> Result<Withdrawal, CoreError> {
        let mut tx = self.pool.begin().await?;
        let row = WithdrawalsRepo::find_for_update_tx(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("withdrawal {id}")))?;

        let next = match withdrawal::apply(row.status, WithdrawalEvent::Reject)? {
            Step::AlreadyApplied => {
                tx.commit().await?;
                return Ok(row);
            }
            Step::Changed(next) => next,
        };

        WithdrawalsRepo::update_status_tx(&mut tx, id, next).await?;
        WithdrawalsRepo::append_log_tx(
            &mut tx,
            id,
            &format!("admin:{approver}"),
            Some(row.status),
            next,
            json!({"reason": reason}),
        )
        .await?;
        tx.commit().await?;

        self.bus
            .publish(DomainEvent::new(
                event_types::WITHDRAWAL_REJECTED,
                "withdrawal",
                json!({"withdrawal_id": id, "owner_id": row.owner_id}),
            ))
            .await;
        self.reload(id).await
    }

    /// Starts the payout transfer. Valid from approved, or from failed while
    /// retries remain. The withdrawal stays processing until the provider's
    /// transfer webhook settles it.
    pub async fn process(&self, id: Uuid, processor: Uuid) -> Result<Withdrawal, CoreError> {
        let mut tx = self.pool.begin().await?;
        let row = WithdrawalsRepo::find_for_update_tx(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("withdrawal {id}")))?;

        if row.status == WithdrawalStatus::Failed && row.retry_count >= MAX_WITHDRAWAL_RETRIES {
            return Err(CoreError::business(
                "RETRIES_EXHAUSTED",
                "withdrawal payout exhausted its retries",
            ));
        }

        let next = match withdrawal::apply(row.status, WithdrawalEvent::StartProcessing)? {
            Step::AlreadyApplied => {
                tx.commit().await?;
                return Ok(row);
            }
            Step::Changed(next) => next,
        };

        WithdrawalsRepo::update_status_tx(&mut tx, id, next).await?;
        WithdrawalsRepo::set_processor_tx(&mut tx, id, processor).await?;
        WithdrawalsRepo::append_log_tx(
            &mut tx,
            id,
            &format!("admin:{processor}"),
            Some(row.status),
            next,
            json!({}),
        )
        .await?;
        tx.commit().await?;

        let account = self
            .bank_accounts
            .find(row.bank_account_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("bank account {}", row.bank_account_id)))?;

        let adapter = self.registry.require(&self.payout_provider)?;
        let failure = match adapter
            .initiate_transfer(&TransferRequest {
                reference: row.reference.clone(),
                amount: row.amount,
                currency: row.currency.clone(),
                account_number: account.account_number.clone(),
                bank_code: account.bank_code.clone(),
                narration: format!("Withdrawal {}", row.reference),
            })
            .await
        {
            Ok(response) if response.success => {
                if let Some(reference) = response.reference.as_deref() {
                    let mut tx = self.pool.begin().await?;
                    WithdrawalsRepo::set_gateway_transaction_tx(&mut tx, id, reference).await?;
                    tx.commit().await?;
                }
                None
            }
            Ok(_) => Some(CoreError::GatewayUnavailable(format!(
                "{} declined transfer {}",
                self.payout_provider, row.reference
            ))),
            Err(err) => Some(err),
        };

        if let Some(err) = failure {
            self.mark_payout_failed(id, "system", json!({"error": err.to_string()}))
                .await?;
            return Err(err);
        }
        self.reload(id).await
    }

    /// Applies a transfer_completed webhook for one of our withdrawal
    /// references. Settlement burns the pending hold.
    pub async fn complete_transfer(&self, event: &CanonicalEvent) -> Result<(), CoreError> {
        let mut tx = self.pool.begin().await?;
        let row = WithdrawalsRepo::find_by_reference_for_update_tx(&mut tx, &event.reference)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("withdrawal {}", event.reference)))?;

        let next = match withdrawal::apply(row.status, WithdrawalEvent::Complete)? {
            Step::AlreadyApplied => {
                tx.commit().await?;
                return Ok(());
            }
            Step::Changed(next) => next,
        };

        BalancesRepo::lock_tx(&mut tx, row.owner_id).await?;
        BalancesRepo::settle_tx(&mut tx, row.owner_id, row.amount).await?;
        WithdrawalsRepo::update_status_tx(&mut tx, row.id, next).await?;
        if let Some(gateway_id) = event.gateway_transaction_id.as_deref() {
            WithdrawalsRepo::set_gateway_transaction_tx(&mut tx, row.id, gateway_id).await?;
        }
        WithdrawalsRepo::append_log_tx(
            &mut tx,
            row.id,
            "gateway",
            Some(row.status),
            next,
            json!({"settled": row.amount.to_string()}),
        )
        .await?;
        tx.commit().await?;

        self.bus
            .publish(DomainEvent::new(
                event_types::WITHDRAWAL_COMPLETED,
                "withdrawal",
                json!({
                    "withdrawal_id": row.id,
                    "owner_id": row.owner_id,
                    "amount": row.amount.to_string(),
                }),
            ))
            .await;
        Ok(())
    }

    /// Applies a transfer_failed webhook. The hold stays in place while
    /// retries remain; once they are exhausted the funds go back to
    /// available.
    pub async fn fail_transfer(&self, event: &CanonicalEvent) -> Result<(), CoreError> {
        let mut tx = self.pool.begin().await?;
        let row = WithdrawalsRepo::find_by_reference_for_update_tx(&mut tx, &event.reference)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("withdrawal {}", event.reference)))?;
        tx.commit().await?;

        self.mark_payout_failed(row.id, "gateway", json!({})).await
    }

    async fn mark_payout_failed(
        &self,
        id: Uuid,
        actor: &str,
        mut metadata: serde_json::Value,
    ) -> Result<(), CoreError> {
        let mut tx = self.pool.begin().await?;
        let row = WithdrawalsRepo::find_for_update_tx(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("withdrawal {id}")))?;

        let next = match withdrawal::apply(row.status, WithdrawalEvent::Fail)? {
            Step::AlreadyApplied => {
                tx.commit().await?;
                return Ok(());
            }
            Step::Changed(next) => next,
        };

        let retries = WithdrawalsRepo::increment_retry_tx(&mut tx, id).await?;
        if retries >= MAX_WITHDRAWAL_RETRIES {
            BalancesRepo::lock_tx(&mut tx, row.owner_id).await?;
            BalancesRepo::release_tx(&mut tx, row.owner_id, row.amount).await?;
            if let serde_json::Value::Object(map) = &mut metadata {
                map.insert("released".to_string(), json!(row.amount.to_string()));
                map.insert("retries_exhausted".to_string(), json!(true));
            }
            tracing::error!(
                withdrawal_id = %id,
                retries,
                "withdrawal payout exhausted its retries, hold released"
            );
        }

        WithdrawalsRepo::update_status_tx(&mut tx, id, next).await?;
        WithdrawalsRepo::append_log_tx(&mut tx, id, actor, Some(row.status), next, metadata)
            .await?;
        tx.commit().await?;

        self.bus
            .publish(DomainEvent::new(
                event_types::WITHDRAWAL_FAILED,
                "withdrawal",
                json!({"withdrawal_id": id, "owner_id": row.owner_id, "retries": retries}),
            ))
            .await;
        Ok(())
    }

    async fn reload(&self, id: Uuid) -> Result<Withdrawal, CoreError> {
        self.withdrawals
            .find(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("withdrawal {id}")))
    }
}
