use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use vault_core::{Slot, SlotRepository, SlotStatus, StoreError};

/// How long a reservation holds a slot before the sweep may reclaim it.
pub const DEFAULT_HOLD_MINUTES: i64 = 60;

/// How many slots the rebalancer keeps purchasable at once.
pub const DEFAULT_TARGET_AVAILABLE: i64 = 200;

#[derive(Debug, thiserror::Error)]
pub enum ReservationError {
    #[error("Slot not found: {0}")]
    NotFound(i32),

    #[error("Slot {id} is not available (status: {status})")]
    NotAvailable { id: i32, status: SlotStatus },

    #[error("Slot {id} is not reserved (status: {status})")]
    NotReserved { id: i32, status: SlotStatus },

    #[error("Slot already sold: {0}")]
    AlreadySold(i32),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a rebalance pass.
#[derive(Debug, Clone)]
pub struct RebalanceOutcome {
    /// Slots flipped `locked -> available`, ascending.
    pub unlocked_ids: Vec<i32>,
    /// Available count after the pass.
    pub available: i64,
}

/// Drives the slot state machine.
///
/// Holds carry a stored deadline instead of an in-process timer, so a crashed
/// instance loses nothing: the next sweep reclaims whatever lapsed while it
/// was down.
pub struct ReservationEngine {
    slots: Arc<dyn SlotRepository>,
    hold: Duration,
    target_available: i64,
}

impl ReservationEngine {
    pub fn new(slots: Arc<dyn SlotRepository>) -> Self {
        Self::with_rules(
            slots,
            Duration::minutes(DEFAULT_HOLD_MINUTES),
            DEFAULT_TARGET_AVAILABLE,
        )
    }

    pub fn with_rules(slots: Arc<dyn SlotRepository>, hold: Duration, target_available: i64) -> Self {
        Self {
            slots,
            hold,
            target_available,
        }
    }

    /// Place a hold on an available slot.
    ///
    /// The claim is a single conditional update; when two buyers race for the
    /// same slot exactly one gets it and the other sees `NotAvailable`.
    pub async fn reserve(&self, slot_id: i32) -> Result<Slot, ReservationError> {
        let reserved_until = Utc::now() + self.hold;
        match self.slots.reserve_slot(slot_id, reserved_until).await? {
            Some(slot) => {
                debug!("Slot {} reserved until {}", slot_id, reserved_until);
                Ok(slot)
            }
            None => Err(self.classify_reserve_miss(slot_id).await),
        }
    }

    /// Give a held slot back before the deadline.
    pub async fn release(&self, slot_id: i32) -> Result<Slot, ReservationError> {
        match self.slots.release_slot(slot_id).await? {
            Some(slot) => {
                debug!("Reservation on slot {} released", slot_id);
                Ok(slot)
            }
            None => Err(self.classify_hold_miss(slot_id).await),
        }
    }

    /// Finalize a sale: `reserved -> sold`.
    ///
    /// A lapsed deadline does not block the sale; only an actual sweep takes
    /// the slot away. Payment confirmations that arrive late still land.
    pub async fn sell(&self, slot_id: i32) -> Result<Slot, ReservationError> {
        match self.slots.sell_slot(slot_id).await? {
            Some(slot) => {
                info!("Slot {} sold", slot_id);
                Ok(slot)
            }
            None => Err(self.classify_hold_miss(slot_id).await),
        }
    }

    /// Reclaim every hold whose deadline has lapsed. Safe to run from any
    /// number of triggers at once; each lapsed slot is reclaimed exactly once.
    pub async fn sweep_expired(&self) -> Result<Vec<i32>, ReservationError> {
        let reclaimed = self.slots.release_expired(Utc::now()).await?;
        if reclaimed.is_empty() {
            debug!("Expiry sweep found nothing to reclaim");
        } else {
            info!("Expiry sweep reclaimed {} lapsed hold(s)", reclaimed.len());
        }
        Ok(reclaimed)
    }

    /// Top the available pool back up to the target by unlocking the
    /// lowest-numbered locked slots. No-op while the pool is at or above
    /// target, or once the locked reserve runs dry.
    pub async fn rebalance(&self) -> Result<RebalanceOutcome, ReservationError> {
        let counts = self.slots.slot_counts().await?;
        let deficit = self.target_available - counts.available;
        if deficit <= 0 {
            return Ok(RebalanceOutcome {
                unlocked_ids: Vec::new(),
                available: counts.available,
            });
        }

        let unlocked_ids = self.slots.unlock_lowest(deficit).await?;
        let available = counts.available + unlocked_ids.len() as i64;
        if !unlocked_ids.is_empty() {
            info!(
                "Rebalance unlocked {} slot(s), {} now available",
                unlocked_ids.len(),
                available
            );
        }
        Ok(RebalanceOutcome {
            unlocked_ids,
            available,
        })
    }

    async fn classify_reserve_miss(&self, slot_id: i32) -> ReservationError {
        match self.slots.get_slot(slot_id).await {
            Ok(None) => ReservationError::NotFound(slot_id),
            Ok(Some(slot)) => ReservationError::NotAvailable {
                id: slot_id,
                status: slot.status,
            },
            Err(err) => ReservationError::Store(err),
        }
    }

    async fn classify_hold_miss(&self, slot_id: i32) -> ReservationError {
        match self.slots.get_slot(slot_id).await {
            Ok(None) => ReservationError::NotFound(slot_id),
            Ok(Some(slot)) if slot.status == SlotStatus::Sold => {
                ReservationError::AlreadySold(slot_id)
            }
            Ok(Some(slot)) => ReservationError::NotReserved {
                id: slot_id,
                status: slot.status,
            },
            Err(err) => ReservationError::Store(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vault_core::price_for;
    use vault_store::MemoryStore;

    fn slot(id: i32, status: SlotStatus) -> Slot {
        Slot {
            id,
            price: price_for(id),
            status,
            reserved_until: None,
            updated_at: Utc::now(),
        }
    }

    fn engine_over(slots: &[Slot]) -> (ReservationEngine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::empty());
        for s in slots {
            store.insert_slot(s.clone());
        }
        (
            ReservationEngine::new(store.clone() as Arc<dyn SlotRepository>),
            store,
        )
    }

    #[tokio::test]
    async fn reserve_places_hold_with_deadline() {
        let (engine, _) = engine_over(&[slot(1, SlotStatus::Available)]);

        let before = Utc::now();
        let reserved = engine.reserve(1).await.unwrap();

        assert_eq!(reserved.status, SlotStatus::Reserved);
        let until = reserved.reserved_until.unwrap();
        assert!(until >= before + Duration::minutes(DEFAULT_HOLD_MINUTES));
        assert!(until <= Utc::now() + Duration::minutes(DEFAULT_HOLD_MINUTES));
    }

    #[tokio::test]
    async fn reserve_is_single_winner() {
        let (engine, _) = engine_over(&[slot(1, SlotStatus::Available)]);

        engine.reserve(1).await.unwrap();
        match engine.reserve(1).await {
            Err(ReservationError::NotAvailable { id: 1, status }) => {
                assert_eq!(status, SlotStatus::Reserved)
            }
            other => panic!("expected NotAvailable, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn racing_reserves_have_exactly_one_winner() {
        let (engine, _) = engine_over(&[slot(1, SlotStatus::Available)]);
        let engine = Arc::new(engine);

        let first = tokio::spawn({
            let engine = engine.clone();
            async move { engine.reserve(1).await }
        });
        let second = tokio::spawn({
            let engine = engine.clone();
            async move { engine.reserve(1).await }
        });
        let (first, second) = tokio::join!(first, second);
        let outcomes = [first.unwrap(), second.unwrap()];

        assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
        let lost = outcomes.into_iter().find(|o| o.is_err()).unwrap();
        assert!(matches!(
            lost,
            Err(ReservationError::NotAvailable {
                id: 1,
                status: SlotStatus::Reserved
            })
        ));
    }

    #[tokio::test]
    async fn reserve_rejects_locked_and_unknown_slots() {
        let (engine, _) = engine_over(&[slot(2, SlotStatus::Locked)]);

        assert!(matches!(
            engine.reserve(2).await,
            Err(ReservationError::NotAvailable {
                id: 2,
                status: SlotStatus::Locked
            })
        ));
        assert!(matches!(
            engine.reserve(99).await,
            Err(ReservationError::NotFound(99))
        ));
    }

    #[tokio::test]
    async fn release_returns_slot_to_pool() {
        let (engine, _) = engine_over(&[slot(3, SlotStatus::Available)]);

        engine.reserve(3).await.unwrap();
        let released = engine.release(3).await.unwrap();

        assert_eq!(released.status, SlotStatus::Available);
        assert!(released.reserved_until.is_none());

        // The freed slot is immediately reservable again.
        engine.reserve(3).await.unwrap();
    }

    #[tokio::test]
    async fn release_requires_an_active_hold() {
        let (engine, _) = engine_over(&[slot(4, SlotStatus::Available)]);

        assert!(matches!(
            engine.release(4).await,
            Err(ReservationError::NotReserved {
                id: 4,
                status: SlotStatus::Available
            })
        ));
    }

    #[tokio::test]
    async fn sell_finalizes_a_reserved_slot() {
        let (engine, _) = engine_over(&[slot(5, SlotStatus::Available)]);

        engine.reserve(5).await.unwrap();
        let sold = engine.sell(5).await.unwrap();

        assert_eq!(sold.status, SlotStatus::Sold);
        assert!(sold.reserved_until.is_none());

        // Sold is terminal for every transition.
        assert!(matches!(
            engine.sell(5).await,
            Err(ReservationError::AlreadySold(5))
        ));
        assert!(matches!(
            engine.reserve(5).await,
            Err(ReservationError::NotAvailable {
                id: 5,
                status: SlotStatus::Sold
            })
        ));
        assert!(matches!(
            engine.release(5).await,
            Err(ReservationError::AlreadySold(5))
        ));
    }

    #[tokio::test]
    async fn sell_requires_a_hold() {
        let (engine, _) = engine_over(&[slot(6, SlotStatus::Available)]);

        assert!(matches!(
            engine.sell(6).await,
            Err(ReservationError::NotReserved {
                id: 6,
                status: SlotStatus::Available
            })
        ));
    }

    #[tokio::test]
    async fn sweep_reclaims_only_lapsed_holds() {
        let store = Arc::new(MemoryStore::empty());
        let lapsed = Slot {
            reserved_until: Some(Utc::now() - Duration::minutes(5)),
            ..slot(1, SlotStatus::Reserved)
        };
        let live = Slot {
            reserved_until: Some(Utc::now() + Duration::minutes(30)),
            ..slot(2, SlotStatus::Reserved)
        };
        store.insert_slot(lapsed);
        store.insert_slot(live);
        store.insert_slot(slot(3, SlotStatus::Available));
        let engine = ReservationEngine::new(store.clone() as Arc<dyn SlotRepository>);

        let reclaimed = engine.sweep_expired().await.unwrap();
        assert_eq!(reclaimed, vec![1]);

        let freed = store.get_slot(1).await.unwrap().unwrap();
        assert_eq!(freed.status, SlotStatus::Available);
        assert!(freed.reserved_until.is_none());

        let untouched = store.get_slot(2).await.unwrap().unwrap();
        assert_eq!(untouched.status, SlotStatus::Reserved);

        // A second sweep finds nothing.
        assert!(engine.sweep_expired().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn lapsed_hold_is_still_sellable_until_swept() {
        let store = Arc::new(MemoryStore::empty());
        store.insert_slot(Slot {
            reserved_until: Some(Utc::now() - Duration::minutes(10)),
            ..slot(7, SlotStatus::Reserved)
        });
        let engine = ReservationEngine::new(store as Arc<dyn SlotRepository>);

        // Late payment confirmation beats the sweep; the sale lands.
        let sold = engine.sell(7).await.unwrap();
        assert_eq!(sold.status, SlotStatus::Sold);
    }

    #[tokio::test]
    async fn rebalance_tops_up_to_target_from_lowest_ids() {
        let store = Arc::new(MemoryStore::empty());
        store.insert_slot(slot(1, SlotStatus::Available));
        store.insert_slot(slot(2, SlotStatus::Available));
        for id in 3..=12 {
            store.insert_slot(slot(id, SlotStatus::Locked));
        }
        let engine = ReservationEngine::with_rules(
            store.clone() as Arc<dyn SlotRepository>,
            Duration::minutes(DEFAULT_HOLD_MINUTES),
            5,
        );

        let outcome = engine.rebalance().await.unwrap();
        assert_eq!(outcome.unlocked_ids, vec![3, 4, 5]);
        assert_eq!(outcome.available, 5);

        // At target: nothing further to do.
        let again = engine.rebalance().await.unwrap();
        assert!(again.unlocked_ids.is_empty());
        assert_eq!(again.available, 5);
    }

    #[tokio::test]
    async fn rebalance_stops_when_locked_reserve_runs_dry() {
        let store = Arc::new(MemoryStore::empty());
        store.insert_slot(slot(1, SlotStatus::Available));
        store.insert_slot(slot(2, SlotStatus::Locked));
        store.insert_slot(slot(3, SlotStatus::Sold));
        let engine =
            ReservationEngine::with_rules(store.clone() as Arc<dyn SlotRepository>, Duration::minutes(60), 5);

        let outcome = engine.rebalance().await.unwrap();
        assert_eq!(outcome.unlocked_ids, vec![2]);
        assert_eq!(outcome.available, 2);
    }
}
