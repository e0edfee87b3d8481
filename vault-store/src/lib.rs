// ============================================
// Vault Store - Persistence Layer
// ============================================

pub mod app_config;
pub mod database;
pub mod legacy_repo;
pub mod memory;
pub mod payment_repo;
pub mod slot_repo;

pub use app_config::Config;
pub use database::DbClient;
pub use legacy_repo::StoreLegacyRepository;
pub use memory::MemoryStore;
pub use payment_repo::StorePaymentRepository;
pub use slot_repo::StoreSlotRepository;
