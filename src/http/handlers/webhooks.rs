use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::error::CoreError;
use crate::service::webhook_ingestor::IngestOutcome;
use crate::AppState;

/// POST /webhooks/:provider. The body must stay raw bytes: signatures are
/// computed over the exact payload the provider sent.
pub async fn receive(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, CoreError> {
    let adapter = state.registry.require(&provider)?;
    let signature = headers
        .get(adapter.signature_header())
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    match state.ingestor.ingest(&provider, signature, &body).await? {
        IngestOutcome::Processed { webhook_id } => {
            Ok(Json(json!({"status": "processed", "webhook_id": webhook_id})))
        }
        IngestOutcome::Duplicate => Ok(Json(json!({"status": "duplicate"}))),
    }
}
