//! Background scheduled tasks for the application.
//!
//! The only recurring job is the reservation expiry sweep: it releases
//! RESERVED tickets whose hold period has elapsed and flips emptied orders
//! to EXPIRED. Call `spawn_all` once during startup.

use crate::services::ReservationService;
use chrono::Utc;

/// Spawn all background tasks.
///
/// Notes
/// - The sweep is idempotent and safe to run concurrently with reservation
///   calls (conditional updates release each ticket at most once).
/// - This function detaches tasks via `tokio::spawn`; it does not block.
pub fn spawn_all(reservation_service: ReservationService, sweep_interval_secs: u64) {
    {
        let svc = reservation_service.clone();
        tokio::spawn(async move {
            loop {
                if let Err(e) = svc.sweep_expired(Utc::now()).await {
                    log::error!("Failed to sweep expired reservations: {e:?}");
                }
                tokio::time::sleep(std::time::Duration::from_secs(sweep_interval_secs)).await;
            }
        });
    }
}
