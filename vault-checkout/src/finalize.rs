use std::sync::Arc;
use tracing::{error, info, warn};

use vault_core::{
    LegacyRepository, NewLegacy, NewMediaItem, NewPaymentRecord, NewTimelineEvent,
    PaymentRepository, Slot, SlotRepository, StoreError,
};
use vault_reservation::{ReservationEngine, ReservationError};

use crate::metadata::{decode_metadata, LegacyDraft, MetadataError};
use crate::stripe::SessionObject;

/// What a finalization pass actually did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// First delivery: the slot was sold and its legacy bound.
    Completed { legacy_id: i64 },
    /// The slot was already sold but carried no legacy; this delivery
    /// finished the half-done work.
    Resumed { legacy_id: i64 },
    /// Redelivery of a fully handled event. Nothing to do.
    AlreadyFinalized,
}

#[derive(Debug, thiserror::Error)]
pub enum FinalizeError {
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Reservation(#[from] ReservationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Turns a completed checkout session into a sold slot with its legacy
/// bound.
///
/// Gateways redeliver webhooks, so the whole pass is idempotent: a repeat
/// delivery for a finalized slot is acknowledged, and a delivery for a slot
/// that sold but never got its legacy resumes where the earlier pass died.
pub struct SaleFinalizer {
    engine: Arc<ReservationEngine>,
    slots: Arc<dyn SlotRepository>,
    legacies: Arc<dyn LegacyRepository>,
    payments: Arc<dyn PaymentRepository>,
}

impl SaleFinalizer {
    pub fn new(
        engine: Arc<ReservationEngine>,
        slots: Arc<dyn SlotRepository>,
        legacies: Arc<dyn LegacyRepository>,
        payments: Arc<dyn PaymentRepository>,
    ) -> Self {
        Self {
            engine,
            slots,
            legacies,
            payments,
        }
    }

    pub async fn finalize(&self, session: &SessionObject) -> Result<FinalizeOutcome, FinalizeError> {
        let draft = decode_metadata(&session.metadata)?;
        let slot_id = draft.slot_id;

        match self.engine.sell(slot_id).await {
            Ok(slot) => {
                let outcome = self.bind_legacy(&slot, &draft, session).await?;
                info!("Slot #{} successfully sold to {}", slot_id, draft.full_name);
                Ok(outcome)
            }
            Err(ReservationError::AlreadySold(_)) => {
                if let Some(legacy) = self.legacies.get_by_slot(slot_id).await? {
                    info!(
                        "Duplicate completion event for slot {} acknowledged (legacy {})",
                        slot_id, legacy.id
                    );
                    return Ok(FinalizeOutcome::AlreadyFinalized);
                }

                // Sold but never bound: an earlier delivery died midway.
                let slot = self
                    .slots
                    .get_slot(slot_id)
                    .await?
                    .ok_or(ReservationError::NotFound(slot_id))?;
                let outcome = self.bind_legacy(&slot, &draft, session).await?;
                warn!("Resumed half-finished finalization for slot {}", slot_id);
                match outcome {
                    FinalizeOutcome::Completed { legacy_id } => {
                        Ok(FinalizeOutcome::Resumed { legacy_id })
                    }
                    other => Ok(other),
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Write the legacy and everything hanging off it. The legacy row is the
    /// essential write; media, timeline and the ledger row only log on
    /// failure so a storage hiccup there never voids the sale.
    async fn bind_legacy(
        &self,
        slot: &Slot,
        draft: &LegacyDraft,
        session: &SessionObject,
    ) -> Result<FinalizeOutcome, FinalizeError> {
        let legacy = self
            .legacies
            .create_legacy(NewLegacy {
                slot_id: slot.id,
                user_id: draft.user_id.clone(),
                full_name: draft.full_name.clone(),
                biography: draft.biography.clone(),
                quote: draft.quote.clone(),
                life_status: draft.life_status,
                is_public: true,
                birth_date: draft.birth_date.clone(),
                death_date: draft.death_date.clone(),
            })
            .await?;

        if !draft.photos.is_empty() {
            let items: Vec<NewMediaItem> = draft
                .photos
                .iter()
                .enumerate()
                .map(|(index, url)| NewMediaItem::photo(url.clone(), index as i32))
                .collect();
            match self.legacies.add_media(legacy.id, &items).await {
                Ok(saved) => info!("Saved {} photo(s) for legacy {}", saved, legacy.id),
                Err(err) => error!("Error saving media for legacy {}: {}", legacy.id, err),
            }
        }

        let events: Vec<NewTimelineEvent> = draft
            .timeline_events
            .iter()
            .filter(|entry| !entry.is_blank())
            .enumerate()
            .map(|(index, entry)| NewTimelineEvent {
                event_date: entry.date.clone(),
                event_text: entry.text.clone(),
                sort_order: index as i32,
            })
            .collect();
        if !events.is_empty() {
            match self.legacies.add_timeline(legacy.id, &events).await {
                Ok(saved) => info!("Saved {} timeline event(s) for legacy {}", saved, legacy.id),
                Err(err) => error!(
                    "Error saving timeline events for legacy {}: {}",
                    legacy.id, err
                ),
            }
        }

        let record = NewPaymentRecord {
            slot_id: slot.id,
            user_id: draft.user_id.clone(),
            amount: session.amount_total.unwrap_or(slot.price as i64),
            currency: session
                .currency
                .clone()
                .unwrap_or_else(|| "eur".to_string()),
            gateway_session_id: session.id.clone(),
            gateway_payment_intent: session.payment_intent.clone(),
            status: "succeeded".to_string(),
        };
        if let Err(err) = self.payments.append(record).await {
            error!("Error recording payment for slot {}: {}", slot.id, err);
        }

        Ok(FinalizeOutcome::Completed {
            legacy_id: legacy.id,
        })
    }
}
