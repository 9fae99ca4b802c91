use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::cancellation::CancelBookingRequest;
use crate::error::CoreError;
use crate::AppState;

pub async fn cancel_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<CancelBookingRequest>,
) -> Result<impl IntoResponse, CoreError> {
    let cancellation = state.cancellations_service.cancel_booking(booking_id, req).await?;
    Ok(Json(cancellation))
}

pub async fn get_cancellation(
    State(state): State<AppState>,
    Path(cancellation_id): Path<Uuid>,
) -> Result<impl IntoResponse, CoreError> {
    let cancellation = state
        .cancellations_repo
        .find(cancellation_id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("cancellation {cancellation_id}")))?;
    Ok(Json(cancellation))
}

#[derive(Deserialize)]
pub struct ReviewRequest {
    pub actor: Uuid,
}

pub async fn approve(
    State(state): State<AppState>,
    Path(cancellation_id): Path<Uuid>,
    Json(req): Json<ReviewRequest>,
) -> Result<impl IntoResponse, CoreError> {
    let cancellation = state
        .cancellations_service
        .approve(cancellation_id, req.actor)
        .await?;
    Ok(Json(cancellation))
}

pub async fn reject(
    State(state): State<AppState>,
    Path(cancellation_id): Path<Uuid>,
    Json(req): Json<ReviewRequest>,
) -> Result<impl IntoResponse, CoreError> {
    let cancellation = state
        .cancellations_service
        .reject(cancellation_id, req.actor)
        .await?;
    Ok(Json(cancellation))
}
