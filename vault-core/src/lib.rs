// ============================================
// Vault Core - Domain Model
// ============================================
// Slot lifecycle, legacy records, payment boundary and the
// repository traits every store backend implements.

pub mod ledger;
pub mod legacy;
pub mod payment;
pub mod repository;
pub mod slot;

pub use ledger::{NewPaymentRecord, PaymentRecord};
pub use legacy::{
    Legacy, LifeStatus, MediaItem, NewLegacy, NewMediaItem, NewTimelineEvent, TimelineEvent,
};
pub use payment::{CheckoutSession, CheckoutSessionRequest, GatewayError, PaymentGateway};
pub use repository::{LegacyRepository, PaymentRepository, SlotRepository, StoreError};
pub use slot::{is_valid_slot_id, price_for, Slot, SlotCounts, SlotStatus, TOTAL_SLOTS};
