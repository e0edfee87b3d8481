use axum::{body::Bytes, extract::State, http::HeaderMap, routing::post, Json, Router};
use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use vault_checkout::signature;
use vault_checkout::stripe::{WebhookEvent, CHECKOUT_COMPLETED};
use vault_checkout::FinalizeOutcome;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/webhooks/payments", post(payment_webhook))
}

/// Gateway push endpoint. The signature covers the raw bytes, so the body
/// must be verified before any JSON parsing.
async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    let header = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::ValidationError("No signature found".to_string()))?;

    signature::verify(
        &body,
        header,
        &state.webhook.secret,
        state.webhook.tolerance,
        Utc::now(),
    )
    .map_err(|err| {
        warn!("Webhook signature verification failed: {}", err);
        AppError::ValidationError("Webhook signature verification failed".to_string())
    })?;

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|err| AppError::ValidationError(format!("Malformed webhook event: {err}")))?;

    if event.type_ != CHECKOUT_COMPLETED {
        info!("Ignoring webhook event {} of type {}", event.id, event.type_);
        return Ok(Json(json!({ "received": true })));
    }

    let session = event.data.object;
    info!("Payment completed for session {}", session.id);

    let outcome = state
        .finalizer
        .finalize(&session)
        .await
        .map_err(AppError::from_finalize)?;

    let body = match outcome {
        FinalizeOutcome::Completed { legacy_id } => json!({
            "received": true,
            "legacy_id": legacy_id,
        }),
        FinalizeOutcome::Resumed { legacy_id } => json!({
            "received": true,
            "legacy_id": legacy_id,
            "resumed": true,
        }),
        FinalizeOutcome::AlreadyFinalized => json!({
            "received": true,
            "duplicate": true,
        }),
    };
    Ok(Json(body))
}
