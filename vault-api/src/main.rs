use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vault_api::state::{AppState, WebhookConfig};
use vault_api::{app, worker};
use vault_checkout::{signature, CheckoutOrchestrator, CheckoutPolicy, SaleFinalizer, StripeGateway};
use vault_core::{LegacyRepository, PaymentRepository, SlotRepository};
use vault_reservation::ReservationEngine;
use vault_store::{
    Config, DbClient, StoreLegacyRepository, StorePaymentRepository, StoreSlotRepository,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vault_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().expect("Failed to load config");
    tracing::info!("Starting Vault API on port {}", config.server.port);

    let db = DbClient::new(&config.database)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    let slots: Arc<dyn SlotRepository> = Arc::new(StoreSlotRepository::new(db.pool.clone()));
    let legacies: Arc<dyn LegacyRepository> = Arc::new(StoreLegacyRepository::new(db.pool.clone()));
    let payments: Arc<dyn PaymentRepository> =
        Arc::new(StorePaymentRepository::new(db.pool.clone()));

    let engine = Arc::new(ReservationEngine::with_rules(
        slots.clone(),
        Duration::seconds(config.business_rules.hold_seconds),
        config.business_rules.target_available,
    ));

    let gateway = Arc::new(
        StripeGateway::new(config.gateway.secret_key.clone())
            .with_api_base(config.gateway.api_base.clone()),
    );
    let checkout = Arc::new(CheckoutOrchestrator::new(
        slots.clone(),
        gateway,
        CheckoutPolicy {
            currency: config.business_rules.currency.clone(),
            public_base_url: config.gateway.public_base_url.clone(),
        },
    ));
    let finalizer = Arc::new(SaleFinalizer::new(
        engine.clone(),
        slots.clone(),
        legacies.clone(),
        payments.clone(),
    ));

    tokio::spawn(worker::start_expiry_worker(
        engine.clone(),
        config.business_rules.sweep_interval_seconds,
    ));

    let app_state = AppState {
        slots,
        legacies,
        payments,
        engine,
        checkout,
        finalizer,
        webhook: WebhookConfig {
            secret: config.gateway.webhook_secret.clone(),
            tolerance: Duration::seconds(signature::DEFAULT_TOLERANCE_SECS),
        },
        business_rules: config.business_rules.clone(),
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
