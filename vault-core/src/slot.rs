// ============================================
// Slots
// ============================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of slots minted at install time. The inventory never grows.
pub const TOTAL_SLOTS: i32 = 10_000;

/// Price of slots #1 and #2, in minor currency units.
pub const BASE_PRICE: i32 = 5_000;

/// Price step applied every second slot.
pub const PRICE_STEP: i32 = 50;

/// Lifecycle status of a slot.
///
/// Legal transitions:
///
/// * `locked -> available` (rebalance)
/// * `available -> reserved` (reserve)
/// * `reserved -> available` (release, expiry sweep)
/// * `reserved -> sold` (sale confirmation)
///
/// `sold` is terminal. Every transition is written as a conditional update
/// whose predicate is the expected current status, so concurrent claims on
/// the same slot resolve to exactly one winner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Available,
    Reserved,
    Sold,
    Locked,
}

impl SlotStatus {
    /// Storage encoding. Matches the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Available => "available",
            SlotStatus::Reserved => "reserved",
            SlotStatus::Sold => "sold",
            SlotStatus::Locked => "locked",
        }
    }

    pub fn parse(value: &str) -> Option<SlotStatus> {
        match value {
            "available" => Some(SlotStatus::Available),
            "reserved" => Some(SlotStatus::Reserved),
            "sold" => Some(SlotStatus::Sold),
            "locked" => Some(SlotStatus::Locked),
            _ => None,
        }
    }
}

impl std::fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A numbered inventory unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub id: i32,
    /// Minor currency units.
    pub price: i32,
    pub status: SlotStatus,
    /// Hold deadline. Set iff `status == Reserved`.
    pub reserved_until: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Slot {
    /// True when the hold deadline has lapsed but no sweep has reclaimed the
    /// slot yet.
    pub fn hold_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == SlotStatus::Reserved
            && self.reserved_until.map(|until| until < now).unwrap_or(false)
    }
}

/// Aggregate counts across the whole inventory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlotCounts {
    pub total: i64,
    pub available: i64,
    pub reserved: i64,
    pub sold: i64,
    pub locked: i64,
}

/// True for ids a slot can legally carry (1-based, dense).
pub fn is_valid_slot_id(id: i32) -> bool {
    (1..=TOTAL_SLOTS).contains(&id)
}

/// Seed price ladder: the price steps up by `PRICE_STEP` every two slots.
pub fn price_for(id: i32) -> i32 {
    BASE_PRICE + PRICE_STEP * ((id - 1) / 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn price_ladder_steps_every_two_slots() {
        assert_eq!(price_for(1), 5_000);
        assert_eq!(price_for(2), 5_000);
        assert_eq!(price_for(3), 5_050);
        assert_eq!(price_for(4), 5_050);
        assert_eq!(price_for(5), 5_100);
        assert_eq!(price_for(TOTAL_SLOTS), 5_000 + 50 * 4_999);
    }

    #[test]
    fn slot_id_bounds() {
        assert!(!is_valid_slot_id(0));
        assert!(is_valid_slot_id(1));
        assert!(is_valid_slot_id(TOTAL_SLOTS));
        assert!(!is_valid_slot_id(TOTAL_SLOTS + 1));
        assert!(!is_valid_slot_id(-3));
    }

    #[test]
    fn status_encoding_round_trips() {
        for status in [
            SlotStatus::Available,
            SlotStatus::Reserved,
            SlotStatus::Sold,
            SlotStatus::Locked,
        ] {
            assert_eq!(SlotStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SlotStatus::parse("SOLD"), None);
        assert_eq!(SlotStatus::parse("gone"), None);
    }

    #[test]
    fn hold_expiry_only_applies_to_reserved_slots() {
        let now = Utc::now();
        let slot = Slot {
            id: 7,
            price: price_for(7),
            status: SlotStatus::Reserved,
            reserved_until: Some(now - Duration::minutes(1)),
            updated_at: now,
        };
        assert!(slot.hold_expired(now));

        let live = Slot {
            reserved_until: Some(now + Duration::minutes(30)),
            ..slot.clone()
        };
        assert!(!live.hold_expired(now));

        let sold = Slot {
            status: SlotStatus::Sold,
            reserved_until: None,
            ..slot
        };
        assert!(!sold.hold_expired(now));
    }
}
