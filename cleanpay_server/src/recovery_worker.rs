use chrono::Duration;
use cleanpay_engine::{ReconcileApi, SqliteDatabase, StepStatus};
use log::*;
use tokio::task::JoinHandle;

use crate::messenger::HttpMessenger;

/// Starts the recovery worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every `interval_secs` the worker sweeps for bookings whose payment completed more than
/// `stale_after` ago without a successful confirmation send, and re-runs reconciliation on each.
/// Because reconciliation is idempotent, the sweep overlapping a live webhook is harmless.
///
/// The worker is monomorphic over the production backend and messenger: the storage trait's
/// async methods carry no `Send` bound, so only a concrete future can cross into `tokio::spawn`.
pub fn start_recovery_worker(
    api: ReconcileApi<SqliteDatabase, HttpMessenger>,
    interval_secs: u64,
    stale_after: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        info!("🕰️ Fulfillment recovery worker started");
        loop {
            timer.tick().await;
            debug!("🕰️ Running fulfillment recovery sweep");
            match api.run_recovery_sweep(stale_after).await {
                Ok(results) if results.is_empty() => {
                    debug!("🕰️ Nothing to recover");
                },
                Ok(results) => {
                    info!("🕰️ {} interrupted fulfillments re-reconciled", results.len());
                    for (id, report) in &results {
                        let finished = report.confirmation == StepStatus::Done
                            || report.confirmation == StepStatus::AlreadyDone;
                        debug!("🕰️ Booking {id}: confirmation finished={finished}");
                    }
                },
                Err(e) => {
                    error!("🕰️ Error running fulfillment recovery sweep: {e}");
                },
            }
        }
    })
}
