// ============================================
// Payment Gateway Boundary
// ============================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything the gateway needs to open a hosted checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    pub slot_id: i32,
    /// Minor currency units, taken from the slot row and never from the
    /// client.
    pub amount: i32,
    pub currency: String,
    pub product_name: String,
    pub product_description: String,
    pub success_url: String,
    pub cancel_url: String,
    /// Flat string map the gateway stores with the session and echoes back
    /// in the completion webhook. The buyer's biography draft rides here.
    pub metadata: BTreeMap<String, String>,
}

/// A created hosted-checkout session. The buyer's browser is redirected to
/// `url`; `id` comes back in the completion webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("payment gateway request failed: {0}")]
    Upstream(String),
    #[error("payment gateway returned an unusable response: {0}")]
    InvalidResponse(String),
}

/// Boundary to the external payment provider. The only implementation in
/// production talks to Stripe; tests swap in a mock.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession, GatewayError>;
}
