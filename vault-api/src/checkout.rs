use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};
use serde::Serialize;
use tracing::info;

use vault_checkout::LegacyDraft;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct CheckoutResponse {
    success: bool,
    session_id: String,
    url: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/checkout", post(start_checkout))
}

/// Opens a hosted checkout session for a reserved slot. The biography
/// draft rides in the session metadata; nothing is written here.
async fn start_checkout(
    State(state): State<AppState>,
    Json(draft): Json<LegacyDraft>,
) -> Result<Json<CheckoutResponse>, AppError> {
    let slot_id = draft.slot_id;
    let session = state
        .checkout
        .start_checkout(&draft)
        .await
        .map_err(AppError::from_checkout)?;

    info!("Checkout session {} created for slot {}", session.id, slot_id);
    Ok(Json(CheckoutResponse {
        success: true,
        session_id: session.id,
        url: session.url,
    }))
}
