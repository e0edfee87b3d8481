// ============================================
// Vault Checkout - Payment Flow
// ============================================
// Hosted-checkout session creation, webhook signature verification
// and the sale finalizer that binds a legacy to its sold slot.

pub mod finalize;
pub mod metadata;
pub mod orchestrator;
pub mod signature;
pub mod stripe;

pub use finalize::{FinalizeError, FinalizeOutcome, SaleFinalizer};
pub use metadata::{LegacyDraft, MetadataError, TimelineEntry};
pub use orchestrator::{CheckoutError, CheckoutOrchestrator, CheckoutPolicy, MockGateway};
pub use stripe::{SessionObject, StripeGateway, WebhookEvent};
