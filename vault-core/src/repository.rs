// ============================================
// Repository Traits
// ============================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::ledger::{NewPaymentRecord, PaymentRecord};
use crate::legacy::{Legacy, MediaItem, NewLegacy, NewMediaItem, NewTimelineEvent, TimelineEvent};
use crate::slot::{Slot, SlotCounts, SlotStatus};

/// Storage-layer failure. Backends box their native error so callers keep a
/// single storage variant in their own taxonomies.
#[derive(Debug, thiserror::Error)]
#[error("storage failure: {0}")]
pub struct StoreError(Box<dyn std::error::Error + Send + Sync>);

impl StoreError {
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StoreError(Box::new(err))
    }

    pub fn message(msg: impl Into<String>) -> Self {
        StoreError(msg.into().into())
    }
}

/// Slot persistence.
///
/// Transition methods are conditional updates: the predicate carries the
/// state-machine precondition and the result is the post-transition row, or
/// `None` when the claim lost (unknown id or wrong current status). Callers
/// never read-then-write.
#[async_trait]
pub trait SlotRepository: Send + Sync {
    async fn get_slot(&self, slot_id: i32) -> Result<Option<Slot>, StoreError>;

    /// All slots in ascending id order, optionally filtered by status.
    async fn list_slots(&self, status: Option<SlotStatus>) -> Result<Vec<Slot>, StoreError>;

    async fn slot_counts(&self) -> Result<SlotCounts, StoreError>;

    /// `available -> reserved` with the given hold deadline.
    async fn reserve_slot(
        &self,
        slot_id: i32,
        reserved_until: DateTime<Utc>,
    ) -> Result<Option<Slot>, StoreError>;

    /// `reserved -> available`, clearing the deadline.
    async fn release_slot(&self, slot_id: i32) -> Result<Option<Slot>, StoreError>;

    /// `reserved -> sold`, clearing the deadline.
    async fn sell_slot(&self, slot_id: i32) -> Result<Option<Slot>, StoreError>;

    /// Bulk `reserved -> available` over every hold with a deadline strictly
    /// before `now`. Returns the reclaimed ids in ascending order.
    async fn release_expired(&self, now: DateTime<Utc>) -> Result<Vec<i32>, StoreError>;

    /// Bulk `locked -> available` over the `limit` lowest-id locked slots.
    /// Returns the unlocked ids in ascending order.
    async fn unlock_lowest(&self, limit: i64) -> Result<Vec<i32>, StoreError>;
}

/// Legacy pages plus their owned media and timeline rows.
#[async_trait]
pub trait LegacyRepository: Send + Sync {
    /// Insert the one-and-only legacy for a slot. Fails on a second insert
    /// for the same slot.
    async fn create_legacy(&self, input: NewLegacy) -> Result<Legacy, StoreError>;

    async fn get_by_slot(&self, slot_id: i32) -> Result<Option<Legacy>, StoreError>;

    /// A single legacy by id, only if its owner opted into the public
    /// gallery.
    async fn get_public(&self, legacy_id: i64) -> Result<Option<Legacy>, StoreError>;

    /// All public legacies, newest first.
    async fn list_public(&self) -> Result<Vec<Legacy>, StoreError>;

    /// All legacies owned by a user, newest first.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Legacy>, StoreError>;

    async fn add_media(&self, legacy_id: i64, items: &[NewMediaItem]) -> Result<u64, StoreError>;

    async fn add_timeline(
        &self,
        legacy_id: i64,
        events: &[NewTimelineEvent],
    ) -> Result<u64, StoreError>;

    /// Media rows for a legacy, ordered by `sort_order`.
    async fn media_for(&self, legacy_id: i64) -> Result<Vec<MediaItem>, StoreError>;

    /// Timeline rows for a legacy, ordered by `sort_order`.
    async fn timeline_for(&self, legacy_id: i64) -> Result<Vec<TimelineEvent>, StoreError>;
}

/// Append-only payments ledger.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn append(&self, record: NewPaymentRecord) -> Result<PaymentRecord, StoreError>;

    /// Sum of everything the user ever paid, in minor currency units.
    async fn total_spent(&self, user_id: &str) -> Result<i64, StoreError>;

    async fn payments_for_user(&self, user_id: &str) -> Result<Vec<PaymentRecord>, StoreError>;
}
