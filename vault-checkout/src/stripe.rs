use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;

use vault_core::{CheckoutSession, CheckoutSessionRequest, GatewayError, PaymentGateway};

pub const STRIPE_API_BASE: &str = "https://api.stripe.com";

/// Event type that finalizes a sale. Everything else is acknowledged and
/// dropped.
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// Stripe implementation of the payment gateway, using hosted Checkout
/// Sessions over the plain REST API.
pub struct StripeGateway {
    secret_key: String,
    api_base: String,
    http: Client,
}

impl StripeGateway {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            api_base: STRIPE_API_BASE.to_string(),
            http: Client::new(),
        }
    }

    /// Point at a different API host (stripe-mock in local setups).
    #[must_use]
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    // Stripe takes form-encoded bodies with bracketed nesting.
    fn session_form(request: &CheckoutSessionRequest) -> Vec<(String, String)> {
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            (
                "line_items[0][price_data][currency]".to_string(),
                request.currency.clone(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                request.amount.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                request.product_name.clone(),
            ),
            (
                "line_items[0][price_data][product_data][description]".to_string(),
                request.product_description.clone(),
            ),
        ];
        for (key, value) in &request.metadata {
            form.push((format!("metadata[{key}]"), value.clone()));
        }
        form
    }
}

#[async_trait::async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&Self::session_form(&request))
            .send()
            .await
            .map_err(|e| GatewayError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            tracing::error!("Stripe session creation failed ({}): {}", status, error_body);
            return Err(GatewayError::Upstream(format!("Stripe returned {status}")));
        }

        let session: StripeSession = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        let url = session
            .url
            .ok_or_else(|| GatewayError::InvalidResponse("session has no redirect url".to_string()))?;

        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }
}

/// Subset of Stripe's Checkout Session create response this service reads.
#[derive(Debug, Deserialize)]
struct StripeSession {
    id: String,
    url: Option<String>,
}

/// Webhook envelope.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub object: SessionObject,
}

/// The completed Checkout Session as delivered inside the webhook event.
#[derive(Debug, Deserialize)]
pub struct SessionObject {
    pub id: String,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_form_nests_line_item_and_metadata_keys() {
        let mut metadata = BTreeMap::new();
        metadata.insert("slotId".to_string(), "42".to_string());
        let request = CheckoutSessionRequest {
            slot_id: 42,
            amount: 6_000,
            currency: "eur".to_string(),
            product_name: "Legacy Vault Slot #00042".to_string(),
            product_description: "Permanent digital legacy slot for Ada".to_string(),
            success_url: "https://vault.example/?success=true&slot=42".to_string(),
            cancel_url: "https://vault.example/?canceled=true".to_string(),
            metadata,
        };

        let form = StripeGateway::session_form(&request);
        let find = |k: &str| {
            form.iter()
                .find(|(key, _)| key == k)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(find("mode"), Some("payment"));
        assert_eq!(find("line_items[0][price_data][unit_amount]"), Some("6000"));
        assert_eq!(find("line_items[0][price_data][currency]"), Some("eur"));
        assert_eq!(find("metadata[slotId]"), Some("42"));
    }

    #[test]
    fn webhook_event_parses_completed_session() {
        let raw = serde_json::json!({
            "id": "evt_123",
            "type": "checkout.session.completed",
            "data": {
                "object": {
                    "id": "cs_test_123",
                    "amount_total": 6050,
                    "currency": "eur",
                    "payment_intent": "pi_123",
                    "metadata": {"slotId": "7", "userId": "user_1"}
                }
            }
        })
        .to_string();

        let event: WebhookEvent = serde_json::from_str(&raw).unwrap();
        assert_eq!(event.type_, CHECKOUT_COMPLETED);
        assert_eq!(event.data.object.amount_total, Some(6050));
        assert_eq!(event.data.object.metadata.get("slotId").unwrap(), "7");
    }

    #[test]
    fn webhook_event_tolerates_sparse_sessions() {
        let raw = r#"{"id":"evt_9","type":"checkout.session.expired","data":{"object":{"id":"cs_9"}}}"#;
        let event: WebhookEvent = serde_json::from_str(raw).unwrap();
        assert!(event.data.object.amount_total.is_none());
        assert!(event.data.object.metadata.is_empty());
    }
}
