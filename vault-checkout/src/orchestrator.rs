use std::sync::Arc;
use tracing::info;

use vault_core::{
    is_valid_slot_id, CheckoutSession, CheckoutSessionRequest, GatewayError, PaymentGateway, Slot,
    SlotRepository, SlotStatus, StoreError,
};

use crate::metadata::{encode_metadata, LegacyDraft};

/// Site-level knobs for session creation.
#[derive(Debug, Clone)]
pub struct CheckoutPolicy {
    /// ISO currency code the whole catalog is priced in.
    pub currency: String,
    /// Public origin the buyer returns to after the hosted page.
    pub public_base_url: String,
}

impl Default for CheckoutPolicy {
    fn default() -> Self {
        Self {
            currency: "eur".to_string(),
            public_base_url: "http://localhost:3000".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("User must be authenticated")]
    MissingUser,

    #[error("Missing required fields: {0}")]
    MissingField(&'static str),

    #[error("Slot not found: {0}")]
    SlotNotFound(i32),

    #[error("Slot {id} is not reserved (status: {status})")]
    NotReserved { id: i32, status: SlotStatus },

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Turns a reserved slot plus a biography draft into a hosted checkout
/// session.
///
/// The charge amount always comes from the slot row; nothing the client
/// sends can change the price.
pub struct CheckoutOrchestrator {
    slots: Arc<dyn SlotRepository>,
    gateway: Arc<dyn PaymentGateway>,
    policy: CheckoutPolicy,
}

impl CheckoutOrchestrator {
    pub fn new(
        slots: Arc<dyn SlotRepository>,
        gateway: Arc<dyn PaymentGateway>,
        policy: CheckoutPolicy,
    ) -> Self {
        Self {
            slots,
            gateway,
            policy,
        }
    }

    pub async fn start_checkout(
        &self,
        draft: &LegacyDraft,
    ) -> Result<CheckoutSession, CheckoutError> {
        if draft.user_id.is_empty() {
            return Err(CheckoutError::MissingUser);
        }
        if !is_valid_slot_id(draft.slot_id) {
            return Err(CheckoutError::MissingField("slotId"));
        }
        if draft.full_name.is_empty() {
            return Err(CheckoutError::MissingField("fullName"));
        }
        if draft.biography.is_empty() {
            return Err(CheckoutError::MissingField("biography"));
        }

        let slot = self
            .slots
            .get_slot(draft.slot_id)
            .await?
            .ok_or(CheckoutError::SlotNotFound(draft.slot_id))?;

        // Checkout only ever starts from a held slot.
        if slot.status != SlotStatus::Reserved {
            return Err(CheckoutError::NotReserved {
                id: slot.id,
                status: slot.status,
            });
        }

        let session = self
            .gateway
            .create_checkout_session(self.session_request(&slot, draft))
            .await?;

        info!(
            "Checkout session {} opened for slot {} by {}",
            session.id, slot.id, draft.user_id
        );
        Ok(session)
    }

    fn session_request(&self, slot: &Slot, draft: &LegacyDraft) -> CheckoutSessionRequest {
        let base = self.policy.public_base_url.trim_end_matches('/');
        CheckoutSessionRequest {
            slot_id: slot.id,
            amount: slot.price,
            currency: self.policy.currency.clone(),
            product_name: format!("Legacy Vault Slot #{:05}", slot.id),
            product_description: format!("Permanent digital legacy slot for {}", draft.full_name),
            success_url: format!("{base}/?success=true&slot={}", slot.id),
            cancel_url: format!("{base}/?canceled=true"),
            metadata: encode_metadata(draft),
        }
    }
}

/// In-memory gateway for tests. Records every request and hands back a
/// deterministic session keyed on the slot id.
#[derive(Default)]
pub struct MockGateway {
    failing: bool,
    requests: std::sync::Mutex<Vec<CheckoutSessionRequest>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway whose every call fails upstream.
    pub fn failing() -> Self {
        Self {
            failing: true,
            requests: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn last_request(&self) -> Option<CheckoutSessionRequest> {
        self.requests
            .lock()
            .ok()
            .and_then(|requests| requests.last().cloned())
    }
}

#[async_trait::async_trait]
impl PaymentGateway for MockGateway {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        if self.failing {
            return Err(GatewayError::Upstream(
                "simulated gateway outage".to_string(),
            ));
        }
        let session = CheckoutSession {
            // Encode the slot id so tests can correlate session and slot.
            id: format!("mock_cs_{:05}", request.slot_id),
            url: format!("https://checkout.mock.local/c/{}", request.slot_id),
        };
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vault_core::price_for;
    use vault_store::MemoryStore;

    fn reserved_slot(id: i32) -> Slot {
        Slot {
            id,
            price: price_for(id),
            status: SlotStatus::Reserved,
            reserved_until: Some(Utc::now() + chrono::Duration::minutes(30)),
            updated_at: Utc::now(),
        }
    }

    fn draft_for(slot_id: i32) -> LegacyDraft {
        LegacyDraft {
            slot_id,
            user_id: "user_1".to_string(),
            full_name: "Ada Lovelace".to_string(),
            biography: "Wrote the first program.".to_string(),
            ..LegacyDraft::default()
        }
    }

    fn orchestrator_over(
        slots: &[Slot],
        gateway: Arc<MockGateway>,
    ) -> (CheckoutOrchestrator, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::empty());
        for slot in slots {
            store.insert_slot(slot.clone());
        }
        let policy = CheckoutPolicy {
            currency: "eur".to_string(),
            public_base_url: "https://vault.example".to_string(),
        };
        (
            CheckoutOrchestrator::new(store.clone(), gateway, policy),
            store,
        )
    }

    #[tokio::test]
    async fn checkout_prices_from_the_slot_row() {
        let gateway = Arc::new(MockGateway::new());
        let (orchestrator, _) = orchestrator_over(&[reserved_slot(7)], gateway.clone());

        let session = orchestrator.start_checkout(&draft_for(7)).await.unwrap();
        assert_eq!(session.id, "mock_cs_00007");

        let request = gateway.last_request().unwrap();
        assert_eq!(request.amount, price_for(7));
        assert_eq!(request.product_name, "Legacy Vault Slot #00007");
        assert_eq!(
            request.success_url,
            "https://vault.example/?success=true&slot=7"
        );
        assert_eq!(request.metadata.get("slotId").unwrap(), "7");
        assert_eq!(request.metadata.get("userId").unwrap(), "user_1");
    }

    #[tokio::test]
    async fn checkout_requires_a_hold() {
        let gateway = Arc::new(MockGateway::new());
        let mut open = reserved_slot(8);
        open.status = SlotStatus::Available;
        open.reserved_until = None;
        let (orchestrator, _) = orchestrator_over(&[open], gateway);

        assert!(matches!(
            orchestrator.start_checkout(&draft_for(8)).await,
            Err(CheckoutError::NotReserved {
                id: 8,
                status: SlotStatus::Available
            })
        ));
        assert!(matches!(
            orchestrator.start_checkout(&draft_for(9)).await,
            Err(CheckoutError::SlotNotFound(9))
        ));
    }

    #[tokio::test]
    async fn checkout_validates_the_draft() {
        let gateway = Arc::new(MockGateway::new());
        let (orchestrator, _) = orchestrator_over(&[reserved_slot(7)], gateway);

        let mut anonymous = draft_for(7);
        anonymous.user_id.clear();
        assert!(matches!(
            orchestrator.start_checkout(&anonymous).await,
            Err(CheckoutError::MissingUser)
        ));

        let mut blank = draft_for(7);
        blank.biography.clear();
        assert!(matches!(
            orchestrator.start_checkout(&blank).await,
            Err(CheckoutError::MissingField("biography"))
        ));

        let mut out_of_range = draft_for(10_001);
        out_of_range.user_id = "user_1".to_string();
        assert!(matches!(
            orchestrator.start_checkout(&out_of_range).await,
            Err(CheckoutError::MissingField("slotId"))
        ));
    }

    #[tokio::test]
    async fn gateway_outage_surfaces_as_gateway_error() {
        let gateway = Arc::new(MockGateway::failing());
        let (orchestrator, _) = orchestrator_over(&[reserved_slot(7)], gateway);

        assert!(matches!(
            orchestrator.start_checkout(&draft_for(7)).await,
            Err(CheckoutError::Gateway(GatewayError::Upstream(_)))
        ));
    }
}
