use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::domain::withdrawal::{BankAccount, CreateBankAccountRequest, RequestWithdrawalRequest};
use crate::error::CoreError;
use crate::AppState;

/// Creates a bank account after resolving it with the payout provider. The
/// resolved account name is what gets stored; an unresolvable account is
/// rejected rather than saved unverified.
pub async fn create_bank_account(
    State(state): State<AppState>,
    Json(req): Json<CreateBankAccountRequest>,
) -> Result<impl IntoResponse, CoreError> {
    let adapter = state.registry.require(&state.payout_provider)?;
    let resolved = adapter
        .resolve_bank_account(&req.account_number, &req.bank_code)
        .await?;
    if !resolved.success {
        return Err(CoreError::business(
            "BANK_ACCOUNT_UNRESOLVABLE",
            "provider could not resolve this account",
        ));
    }
    let account_name = resolved
        .raw
        .pointer("/data/account_name")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let account = BankAccount {
        id: Uuid::new_v4(),
        owner_id: req.owner_id,
        account_number: req.account_number,
        bank_code: req.bank_code,
        account_name,
        verified: true,
        is_default: req.is_default,
        created_at: Utc::now(),
    };
    state.bank_accounts.insert(&account).await?;
    Ok((axum::http::StatusCode::CREATED, Json(account)))
}

pub async fn list_bank_accounts(
    State(state): State<AppState>,
    Path(owner_id): Path<Uuid>,
) -> Result<impl IntoResponse, CoreError> {
    let accounts = state.bank_accounts.list_for_owner(owner_id).await?;
    Ok(Json(accounts))
}

pub async fn get_balance(
    State(state): State<AppState>,
    Path(owner_id): Path<Uuid>,
) -> Result<impl IntoResponse, CoreError> {
    let balance = state.balances.get(owner_id).await?;
    Ok(Json(json!({
        "owner_id": owner_id,
        "available": balance.available.to_string(),
        "pending": balance.pending.to_string(),
    })))
}

pub async fn request_withdrawal(
    State(state): State<AppState>,
    Json(req): Json<RequestWithdrawalRequest>,
) -> Result<impl IntoResponse, CoreError> {
    let withdrawal = state.withdrawals_flow.request(req).await?;
    Ok((axum::http::StatusCode::CREATED, Json(withdrawal)))
}

pub async fn get_withdrawal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CoreError> {
    let withdrawal = state
        .withdrawals_repo
        .find(id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("withdrawal {id}")))?;
    Ok(Json(withdrawal))
}

pub async fn list_logs(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CoreError> {
    let logs = state.withdrawals_repo.list_logs(id).await?;
    Ok(Json(logs))
}

#[derive(Deserialize)]
pub struct ReviewRequest {
    pub actor: Uuid,
    pub reason: Option<String>,
}

pub async fn approve(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReviewRequest>,
) -> Result<impl IntoResponse, CoreError> {
    let withdrawal = state.withdrawals_flow.approve(id, req.actor).await?;
    Ok(Json(withdrawal))
}

pub async fn reject(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReviewRequest>,
) -> Result<impl IntoResponse, CoreError> {
    let withdrawal = state
        .withdrawals_flow
        .reject(id, req.actor, req.reason)
        .await?;
    Ok(Json(withdrawal))
}

pub async fn process(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReviewRequest>,
) -> Result<impl IntoResponse, CoreError> {
    let withdrawal = state.withdrawals_flow.process(id, req.actor).await?;
    Ok(Json(withdrawal))
}
