use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard};

use vault_core::ledger::{NewPaymentRecord, PaymentRecord};
use vault_core::legacy::{
    Legacy, MediaItem, NewLegacy, NewMediaItem, NewTimelineEvent, TimelineEvent,
};
use vault_core::repository::{LegacyRepository, PaymentRepository, SlotRepository, StoreError};
use vault_core::slot::{price_for, Slot, SlotCounts, SlotStatus, TOTAL_SLOTS};

/// Whole-store in-memory backend.
///
/// Implements every repository trait over plain maps, with the same
/// conditional-update semantics as the Postgres backend. Backs the test
/// suites; nothing about it persists.
pub struct MemoryStore {
    slots: Mutex<BTreeMap<i32, Slot>>,
    legacies: Mutex<Vec<Legacy>>,
    media: Mutex<Vec<MediaItem>>,
    timeline: Mutex<Vec<TimelineEvent>>,
    payments: Mutex<Vec<PaymentRecord>>,
    next_id: AtomicI64,
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, StoreError> {
    mutex
        .lock()
        .map_err(|_| StoreError::message(format!("{what} table lock poisoned")))
}

impl MemoryStore {
    pub fn empty() -> Self {
        Self {
            slots: Mutex::new(BTreeMap::new()),
            legacies: Mutex::new(Vec::new()),
            media: Mutex::new(Vec::new()),
            timeline: Mutex::new(Vec::new()),
            payments: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// The full catalog exactly as the install migration seeds it: every
    /// slot locked, priced along the ladder.
    pub fn seeded() -> Self {
        let store = Self::empty();
        {
            let mut slots = store.slots.lock().expect("fresh lock");
            let now = Utc::now();
            for id in 1..=TOTAL_SLOTS {
                slots.insert(
                    id,
                    Slot {
                        id,
                        price: price_for(id),
                        status: SlotStatus::Locked,
                        reserved_until: None,
                        updated_at: now,
                    },
                );
            }
        }
        store
    }

    /// Place a slot row directly, bypassing the state machine. Test setup
    /// only.
    pub fn insert_slot(&self, slot: Slot) {
        if let Ok(mut slots) = self.slots.lock() {
            slots.insert(slot.id, slot);
        }
    }

    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::empty()
    }
}

#[async_trait]
impl SlotRepository for MemoryStore {
    async fn get_slot(&self, slot_id: i32) -> Result<Option<Slot>, StoreError> {
        Ok(lock(&self.slots, "slots")?.get(&slot_id).cloned())
    }

    async fn list_slots(&self, status: Option<SlotStatus>) -> Result<Vec<Slot>, StoreError> {
        let slots = lock(&self.slots, "slots")?;
        Ok(slots
            .values()
            .filter(|slot| status.map(|s| slot.status == s).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn slot_counts(&self) -> Result<SlotCounts, StoreError> {
        let slots = lock(&self.slots, "slots")?;
        let mut counts = SlotCounts {
            total: slots.len() as i64,
            ..SlotCounts::default()
        };
        for slot in slots.values() {
            match slot.status {
                SlotStatus::Available => counts.available += 1,
                SlotStatus::Reserved => counts.reserved += 1,
                SlotStatus::Sold => counts.sold += 1,
                SlotStatus::Locked => counts.locked += 1,
            }
        }
        Ok(counts)
    }

    async fn reserve_slot(
        &self,
        slot_id: i32,
        reserved_until: DateTime<Utc>,
    ) -> Result<Option<Slot>, StoreError> {
        let mut slots = lock(&self.slots, "slots")?;
        match slots.get_mut(&slot_id) {
            Some(slot) if slot.status == SlotStatus::Available => {
                slot.status = SlotStatus::Reserved;
                slot.reserved_until = Some(reserved_until);
                slot.updated_at = Utc::now();
                Ok(Some(slot.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn release_slot(&self, slot_id: i32) -> Result<Option<Slot>, StoreError> {
        let mut slots = lock(&self.slots, "slots")?;
        match slots.get_mut(&slot_id) {
            Some(slot) if slot.status == SlotStatus::Reserved => {
                slot.status = SlotStatus::Available;
                slot.reserved_until = None;
                slot.updated_at = Utc::now();
                Ok(Some(slot.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn sell_slot(&self, slot_id: i32) -> Result<Option<Slot>, StoreError> {
        let mut slots = lock(&self.slots, "slots")?;
        match slots.get_mut(&slot_id) {
            Some(slot) if slot.status == SlotStatus::Reserved => {
                slot.status = SlotStatus::Sold;
                slot.reserved_until = None;
                slot.updated_at = Utc::now();
                Ok(Some(slot.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn release_expired(&self, now: DateTime<Utc>) -> Result<Vec<i32>, StoreError> {
        let mut slots = lock(&self.slots, "slots")?;
        let mut reclaimed = Vec::new();
        for slot in slots.values_mut() {
            let lapsed = slot.status == SlotStatus::Reserved
                && slot.reserved_until.map(|until| until < now).unwrap_or(false);
            if lapsed {
                slot.status = SlotStatus::Available;
                slot.reserved_until = None;
                slot.updated_at = now;
                reclaimed.push(slot.id);
            }
        }
        Ok(reclaimed)
    }

    async fn unlock_lowest(&self, limit: i64) -> Result<Vec<i32>, StoreError> {
        let mut slots = lock(&self.slots, "slots")?;
        let mut unlocked = Vec::new();
        // BTreeMap iterates in ascending id order.
        for slot in slots.values_mut() {
            if unlocked.len() as i64 >= limit {
                break;
            }
            if slot.status == SlotStatus::Locked {
                slot.status = SlotStatus::Available;
                slot.updated_at = Utc::now();
                unlocked.push(slot.id);
            }
        }
        Ok(unlocked)
    }
}

#[async_trait]
impl LegacyRepository for MemoryStore {
    async fn create_legacy(&self, input: NewLegacy) -> Result<Legacy, StoreError> {
        let mut legacies = lock(&self.legacies, "legacies")?;
        if legacies.iter().any(|legacy| legacy.slot_id == input.slot_id) {
            return Err(StoreError::message(format!(
                "legacy already exists for slot {}",
                input.slot_id
            )));
        }
        let legacy = Legacy {
            id: self.allocate_id(),
            slot_id: input.slot_id,
            user_id: input.user_id,
            full_name: input.full_name,
            biography: input.biography,
            quote: input.quote,
            life_status: input.life_status,
            is_public: input.is_public,
            birth_date: input.birth_date,
            death_date: input.death_date,
            created_at: Utc::now(),
        };
        legacies.push(legacy.clone());
        Ok(legacy)
    }

    async fn get_by_slot(&self, slot_id: i32) -> Result<Option<Legacy>, StoreError> {
        let legacies = lock(&self.legacies, "legacies")?;
        Ok(legacies
            .iter()
            .find(|legacy| legacy.slot_id == slot_id)
            .cloned())
    }

    async fn get_public(&self, legacy_id: i64) -> Result<Option<Legacy>, StoreError> {
        let legacies = lock(&self.legacies, "legacies")?;
        Ok(legacies
            .iter()
            .find(|legacy| legacy.id == legacy_id && legacy.is_public)
            .cloned())
    }

    async fn list_public(&self) -> Result<Vec<Legacy>, StoreError> {
        let legacies = lock(&self.legacies, "legacies")?;
        let mut result: Vec<Legacy> = legacies
            .iter()
            .filter(|legacy| legacy.is_public)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(result)
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Legacy>, StoreError> {
        let legacies = lock(&self.legacies, "legacies")?;
        let mut result: Vec<Legacy> = legacies
            .iter()
            .filter(|legacy| legacy.user_id == user_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(result)
    }

    async fn add_media(&self, legacy_id: i64, items: &[NewMediaItem]) -> Result<u64, StoreError> {
        let mut media = lock(&self.media, "media")?;
        for item in items {
            media.push(MediaItem {
                id: self.allocate_id(),
                legacy_id,
                kind: item.kind.clone(),
                url: item.url.clone(),
                mime_type: item.mime_type.clone(),
                title: item.title.clone(),
                caption: item.caption.clone(),
                sort_order: item.sort_order,
                created_at: Utc::now(),
            });
        }
        Ok(items.len() as u64)
    }

    async fn add_timeline(
        &self,
        legacy_id: i64,
        events: &[NewTimelineEvent],
    ) -> Result<u64, StoreError> {
        let mut timeline = lock(&self.timeline, "timeline")?;
        for event in events {
            timeline.push(TimelineEvent {
                id: self.allocate_id(),
                legacy_id,
                event_date: event.event_date.clone(),
                event_text: event.event_text.clone(),
                sort_order: event.sort_order,
                created_at: Utc::now(),
            });
        }
        Ok(events.len() as u64)
    }

    async fn media_for(&self, legacy_id: i64) -> Result<Vec<MediaItem>, StoreError> {
        let media = lock(&self.media, "media")?;
        let mut result: Vec<MediaItem> = media
            .iter()
            .filter(|item| item.legacy_id == legacy_id)
            .cloned()
            .collect();
        result.sort_by_key(|item| item.sort_order);
        Ok(result)
    }

    async fn timeline_for(&self, legacy_id: i64) -> Result<Vec<TimelineEvent>, StoreError> {
        let timeline = lock(&self.timeline, "timeline")?;
        let mut result: Vec<TimelineEvent> = timeline
            .iter()
            .filter(|event| event.legacy_id == legacy_id)
            .cloned()
            .collect();
        result.sort_by_key(|event| event.sort_order);
        Ok(result)
    }
}

#[async_trait]
impl PaymentRepository for MemoryStore {
    async fn append(&self, record: NewPaymentRecord) -> Result<PaymentRecord, StoreError> {
        let mut payments = lock(&self.payments, "payments")?;
        let stored = PaymentRecord {
            id: self.allocate_id(),
            slot_id: record.slot_id,
            user_id: record.user_id,
            amount: record.amount,
            currency: record.currency,
            gateway_session_id: record.gateway_session_id,
            gateway_payment_intent: record.gateway_payment_intent,
            status: record.status,
            created_at: Utc::now(),
        };
        payments.push(stored.clone());
        Ok(stored)
    }

    async fn total_spent(&self, user_id: &str) -> Result<i64, StoreError> {
        let payments = lock(&self.payments, "payments")?;
        Ok(payments
            .iter()
            .filter(|payment| payment.user_id == user_id)
            .map(|payment| payment.amount)
            .sum())
    }

    async fn payments_for_user(&self, user_id: &str) -> Result<Vec<PaymentRecord>, StoreError> {
        let payments = lock(&self.payments, "payments")?;
        let mut result: Vec<PaymentRecord> = payments
            .iter()
            .filter(|payment| payment.user_id == user_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use vault_core::legacy::LifeStatus;

    fn available(id: i32) -> Slot {
        Slot {
            id,
            price: price_for(id),
            status: SlotStatus::Available,
            reserved_until: None,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn conditional_updates_enforce_the_state_machine() {
        let store = MemoryStore::empty();
        store.insert_slot(available(1));
        let until = Utc::now() + Duration::hours(1);

        // Not reserved yet: release and sell both refuse.
        assert!(store.release_slot(1).await.unwrap().is_none());
        assert!(store.sell_slot(1).await.unwrap().is_none());

        assert!(store.reserve_slot(1, until).await.unwrap().is_some());
        // Second claim loses.
        assert!(store.reserve_slot(1, until).await.unwrap().is_none());

        assert!(store.sell_slot(1).await.unwrap().is_some());
        // Sold is terminal.
        assert!(store.sell_slot(1).await.unwrap().is_none());
        assert!(store.release_slot(1).await.unwrap().is_none());
        assert!(store.reserve_slot(1, until).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn counts_track_every_status() {
        let store = MemoryStore::empty();
        store.insert_slot(available(1));
        store.insert_slot(available(2));
        store.insert_slot(Slot {
            status: SlotStatus::Locked,
            ..available(3)
        });
        store
            .reserve_slot(2, Utc::now() + Duration::hours(1))
            .await
            .unwrap();

        let counts = store.slot_counts().await.unwrap();
        assert_eq!(counts.total, 3);
        assert_eq!(counts.available, 1);
        assert_eq!(counts.reserved, 1);
        assert_eq!(counts.locked, 1);
        assert_eq!(counts.sold, 0);
    }

    #[tokio::test]
    async fn seeded_store_matches_the_install_migration() {
        let store = MemoryStore::seeded();
        let counts = store.slot_counts().await.unwrap();
        assert_eq!(counts.total, TOTAL_SLOTS as i64);
        assert_eq!(counts.locked, TOTAL_SLOTS as i64);

        let first = store.get_slot(1).await.unwrap().unwrap();
        let last = store.get_slot(TOTAL_SLOTS).await.unwrap().unwrap();
        assert_eq!(first.price, 5_000);
        assert_eq!(last.price, price_for(TOTAL_SLOTS));
    }

    #[tokio::test]
    async fn one_legacy_per_slot() {
        let store = MemoryStore::empty();
        let input = NewLegacy {
            slot_id: 9,
            user_id: "user_1".to_string(),
            full_name: "Ada".to_string(),
            biography: "bio".to_string(),
            quote: String::new(),
            life_status: LifeStatus::Living,
            is_public: true,
            birth_date: None,
            death_date: None,
        };

        store.create_legacy(input.clone()).await.unwrap();
        assert!(store.create_legacy(input).await.is_err());
    }

    #[tokio::test]
    async fn ledger_totals_per_user() {
        let store = MemoryStore::empty();
        for (slot_id, amount) in [(1, 5_000), (2, 5_000), (3, 5_050)] {
            store
                .append(NewPaymentRecord {
                    slot_id,
                    user_id: if slot_id == 3 { "other" } else { "user_1" }.to_string(),
                    amount,
                    currency: "eur".to_string(),
                    gateway_session_id: format!("cs_{slot_id}"),
                    gateway_payment_intent: None,
                    status: "succeeded".to_string(),
                })
                .await
                .unwrap();
        }

        assert_eq!(store.total_spent("user_1").await.unwrap(), 10_000);
        assert_eq!(store.total_spent("other").await.unwrap(), 5_050);
        assert_eq!(store.total_spent("nobody").await.unwrap(), 0);
        assert_eq!(store.payments_for_user("user_1").await.unwrap().len(), 2);
    }
}
