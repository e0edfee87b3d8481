// ============================================
// Vault Reservation - Slot Lifecycle Engine
// ============================================
// Reserve/release/sell transitions plus the expiry sweep and the
// availability rebalancer. All transitions go through conditional
// updates in the slot repository; the engine never reads then writes.

pub mod engine;

pub use engine::{
    RebalanceOutcome, ReservationEngine, ReservationError, DEFAULT_HOLD_MINUTES,
    DEFAULT_TARGET_AVAILABLE,
};
