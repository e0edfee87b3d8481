use std::sync::Arc;

use chrono::Duration;
use vault_checkout::{CheckoutOrchestrator, SaleFinalizer};
use vault_core::{LegacyRepository, PaymentRepository, SlotRepository};
use vault_reservation::ReservationEngine;
use vault_store::app_config::BusinessRules;

#[derive(Clone)]
pub struct WebhookConfig {
    pub secret: String,
    pub tolerance: Duration,
}

#[derive(Clone)]
pub struct AppState {
    pub slots: Arc<dyn SlotRepository>,
    pub legacies: Arc<dyn LegacyRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub engine: Arc<ReservationEngine>,
    pub checkout: Arc<CheckoutOrchestrator>,
    pub finalizer: Arc<SaleFinalizer>,
    pub webhook: WebhookConfig,
    pub business_rules: BusinessRules,
}
