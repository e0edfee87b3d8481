use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

use vault_reservation::ReservationEngine;

/// In-process scheduler: reclaims lapsed holds, then tops the purchasable
/// pool back up. Both passes are idempotent, so an external scheduler
/// hitting the expire endpoint at the same time is harmless.
pub async fn start_expiry_worker(engine: Arc<ReservationEngine>, interval_seconds: u64) {
    info!("Expiry worker started, sweeping every {}s", interval_seconds);

    loop {
        sleep(Duration::from_secs(interval_seconds)).await;

        match engine.sweep_expired().await {
            Ok(ids) if !ids.is_empty() => {
                info!("Expired {} reservation(s): {:?}", ids.len(), ids);
            }
            Ok(_) => {}
            Err(e) => error!("Expiry sweep failed: {}", e),
        }

        match engine.rebalance().await {
            Ok(outcome) if !outcome.unlocked_ids.is_empty() => {
                info!(
                    "Unlocked {} slot(s), {} now available",
                    outcome.unlocked_ids.len(),
                    outcome.available
                );
            }
            Ok(_) => {}
            Err(e) => error!("Rebalance failed: {}", e),
        }
    }
}
