use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::domain::order::CheckoutRequest;
use crate::error::CoreError;
use crate::AppState;

pub async fn checkout(
    State(state): State<AppState>,
    Json(req): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, CoreError> {
    let response = state.payments.checkout(req).await?;
    Ok((axum::http::StatusCode::CREATED, Json(response)))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, CoreError> {
    let order = state
        .orders
        .find_order(order_id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("order {order_id}")))?;
    let bookings = state.orders.bookings_for_order(order_id).await?;
    Ok(Json(json!({"order": order, "bookings": bookings})))
}

#[derive(Deserialize)]
pub struct RetryPaymentRequest {
    pub user_email: String,
}

pub async fn retry_payment(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<RetryPaymentRequest>,
) -> Result<impl IntoResponse, CoreError> {
    let response = state
        .payments
        .retry_payment(order_id, &req.user_email)
        .await?;
    Ok(Json(response))
}

/// Admin-only: marks a paid order fulfilled.
pub async fn complete_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, CoreError> {
    let order = state.payments.complete_order(order_id).await?;
    Ok(Json(order))
}
