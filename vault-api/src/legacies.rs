use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use vault_core::{Legacy, MediaItem, TimelineEvent};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct LegacyDetail {
    #[serde(flatten)]
    legacy: Legacy,
    photos: Vec<MediaItem>,
    timeline_events: Vec<TimelineEvent>,
}

#[derive(Debug, Serialize)]
struct SpendStats {
    total_slots: usize,
    total_spent: i64,
}

#[derive(Debug, Serialize)]
struct UserLegaciesResponse {
    success: bool,
    legacies: Vec<LegacyDetail>,
    stats: SpendStats,
}

/// Gallery card: the legacy plus its first photo.
#[derive(Debug, Serialize)]
struct PublicSummary {
    #[serde(flatten)]
    legacy: Legacy,
    cover_photo: Option<String>,
}

#[derive(Debug, Serialize)]
struct PublicListResponse {
    success: bool,
    legacies: Vec<PublicSummary>,
}

#[derive(Debug, Serialize)]
struct PublicDetailResponse {
    success: bool,
    legacy: LegacyDetail,
}

#[derive(Debug, Deserialize)]
struct PublicQuery {
    legacy_id: Option<i64>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/users/{user_id}/legacies", get(user_legacies))
        .route("/v1/legacies/public", get(public_legacies))
}

async fn hydrate(state: &AppState, legacy: Legacy) -> Result<LegacyDetail, AppError> {
    let photos = state.legacies.media_for(legacy.id).await?;
    let timeline_events = state.legacies.timeline_for(legacy.id).await?;
    Ok(LegacyDetail {
        legacy,
        photos,
        timeline_events,
    })
}

/// Everything a signed-in buyer owns, with their lifetime spend.
async fn user_legacies(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserLegaciesResponse>, AppError> {
    if user_id.is_empty() {
        return Err(AppError::ValidationError("User ID is required".to_string()));
    }

    let owned = state.legacies.list_for_user(&user_id).await?;
    let mut legacies = Vec::with_capacity(owned.len());
    for legacy in owned {
        legacies.push(hydrate(&state, legacy).await?);
    }

    let total_spent = state.payments.total_spent(&user_id).await?;
    let stats = SpendStats {
        total_slots: legacies.len(),
        total_spent,
    };

    Ok(Json(UserLegaciesResponse {
        success: true,
        legacies,
        stats,
    }))
}

/// The public gallery. `?legacy_id=` fetches one page with its full media
/// and timeline; without it every public legacy comes back as a card.
async fn public_legacies(
    State(state): State<AppState>,
    Query(params): Query<PublicQuery>,
) -> Result<Response, AppError> {
    if let Some(legacy_id) = params.legacy_id {
        let found = state
            .legacies
            .get_public(legacy_id)
            .await?
            .ok_or_else(|| AppError::NotFoundError("Legacy not found".to_string()))?;
        let legacy = hydrate(&state, found).await?;
        return Ok(Json(PublicDetailResponse {
            success: true,
            legacy,
        })
        .into_response());
    }

    let public = state.legacies.list_public().await?;
    let mut legacies = Vec::with_capacity(public.len());
    for legacy in public {
        let photos = state.legacies.media_for(legacy.id).await?;
        let cover_photo = photos
            .iter()
            .find(|item| item.kind == "photo")
            .map(|item| item.url.clone());
        legacies.push(PublicSummary {
            legacy,
            cover_photo,
        });
    }

    Ok(Json(PublicListResponse {
        success: true,
        legacies,
    })
    .into_response())
}
