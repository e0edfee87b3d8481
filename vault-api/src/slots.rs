use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::info;

use vault_core::{is_valid_slot_id, Legacy, Slot, SlotCounts, SlotStatus, TOTAL_SLOTS};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct AllSlotsResponse {
    success: bool,
    count: usize,
    stats: SlotCounts,
    slots: Vec<Slot>,
}

#[derive(Debug, Serialize)]
struct AvailableSlotsResponse {
    success: bool,
    slots: Vec<Slot>,
}

#[derive(Debug, Serialize)]
struct SlotDetailResponse {
    success: bool,
    slot: Slot,
    legacy: Option<Legacy>,
}

#[derive(Debug, Serialize)]
struct ReserveResponse {
    success: bool,
    slot: Slot,
    message: String,
}

#[derive(Debug, Serialize)]
struct ReleaseResponse {
    success: bool,
    message: String,
}

#[derive(Debug, Serialize)]
struct ExpireResponse {
    success: bool,
    message: String,
    expired_count: usize,
    expired_ids: Vec<i32>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/slots", get(list_all))
        .route("/v1/slots/available", get(list_available))
        .route("/v1/slots/expire-reservations", post(expire_reservations))
        .route("/v1/slots/{id}", get(slot_detail))
        .route("/v1/slots/{id}/reserve", post(reserve_slot))
        .route("/v1/slots/{id}/release", post(release_slot))
}

fn validate_slot_id(id: i32) -> Result<(), AppError> {
    if is_valid_slot_id(id) {
        Ok(())
    } else {
        Err(AppError::ValidationError(format!(
            "Invalid slot ID. Must be between 1 and {TOTAL_SLOTS}"
        )))
    }
}

async fn list_all(State(state): State<AppState>) -> Result<Json<AllSlotsResponse>, AppError> {
    let slots = state.slots.list_slots(None).await?;
    let stats = state.slots.slot_counts().await?;

    Ok(Json(AllSlotsResponse {
        success: true,
        count: slots.len(),
        stats,
        slots,
    }))
}

/// The storefront grid. Tops the pool up from the locked reserve first so
/// the site never looks sold out while stock remains.
async fn list_available(
    State(state): State<AppState>,
) -> Result<Json<AvailableSlotsResponse>, AppError> {
    let outcome = state
        .engine
        .rebalance()
        .await
        .map_err(AppError::from_reservation)?;
    if !outcome.unlocked_ids.is_empty() {
        info!(
            "Unlocked {} slot(s) ahead of listing, {} now available",
            outcome.unlocked_ids.len(),
            outcome.available
        );
    }

    let slots = state.slots.list_slots(Some(SlotStatus::Available)).await?;
    Ok(Json(AvailableSlotsResponse {
        success: true,
        slots,
    }))
}

async fn slot_detail(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<SlotDetailResponse>, AppError> {
    validate_slot_id(id)?;

    let slot = state
        .slots
        .get_slot(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("Slot not found: {id}")))?;

    let legacy = if slot.status == SlotStatus::Sold {
        state.legacies.get_by_slot(id).await?
    } else {
        None
    };

    Ok(Json(SlotDetailResponse {
        success: true,
        slot,
        legacy,
    }))
}

async fn reserve_slot(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ReserveResponse>, AppError> {
    validate_slot_id(id)?;

    let slot = state
        .engine
        .reserve(id)
        .await
        .map_err(AppError::from_reservation)?;

    let message = format!(
        "Slot #{} reserved for {} minutes",
        slot.id,
        state.business_rules.hold_seconds / 60
    );
    Ok(Json(ReserveResponse {
        success: true,
        slot,
        message,
    }))
}

async fn release_slot(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ReleaseResponse>, AppError> {
    validate_slot_id(id)?;

    let slot = state
        .engine
        .release(id)
        .await
        .map_err(AppError::from_reservation)?;

    Ok(Json(ReleaseResponse {
        success: true,
        message: format!("Slot #{} is now available again", slot.id),
    }))
}

/// Endpoint form of the expiry sweep, kept for external schedulers and
/// opportunistic page-load calls. The in-process worker runs the same pass.
async fn expire_reservations(
    State(state): State<AppState>,
) -> Result<Json<ExpireResponse>, AppError> {
    let expired_ids = state
        .engine
        .sweep_expired()
        .await
        .map_err(AppError::from_reservation)?;

    let message = if expired_ids.is_empty() {
        "No expired reservations found".to_string()
    } else {
        format!("Expired {} reservation(s)", expired_ids.len())
    };

    Ok(Json(ExpireResponse {
        success: true,
        message,
        expired_count: expired_ids.len(),
        expired_ids,
    }))
}
