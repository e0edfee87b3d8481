// ============================================
// Payments Ledger
// ============================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Append-only audit row for a completed payment. Never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: i64,
    pub slot_id: i32,
    pub user_id: String,
    /// Total charged, in minor currency units, as reported by the gateway.
    pub amount: i64,
    pub currency: String,
    pub gateway_session_id: String,
    pub gateway_payment_intent: Option<String>,
    /// Outcome as reported by the gateway, e.g. `succeeded`.
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPaymentRecord {
    pub slot_id: i32,
    pub user_id: String,
    pub amount: i64,
    pub currency: String,
    pub gateway_session_id: String,
    pub gateway_payment_intent: Option<String>,
    pub status: String,
}
