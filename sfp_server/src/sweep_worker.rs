use std::time::Duration;

use log::*;
use sfp_engine::{ReconciliationSweeper, SqliteDatabase, SweepError};
use tokio::{task::JoinHandle, time::MissedTickBehavior};

use crate::integrations::gateway::GatewayClient;

/// Starts the reconciliation worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// The first sweep runs immediately, so orders left over from a previous run are picked up on start.
pub fn start_sweep_worker(
    sweeper: ReconciliationSweeper<SqliteDatabase, GatewayClient>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("🧹️ Reconciliation worker started. Sweeping every {}s", interval.as_secs());
        loop {
            timer.tick().await;
            debug!("🧹️ Running scheduled reconciliation sweep");
            match sweeper.sweep().await {
                Ok(result) if result.total() > 0 => {
                    info!(
                        "🧹️ Scheduled sweep: {} synced, {} failed, {} still pending",
                        result.synced, result.failed, result.skipped
                    );
                },
                Ok(_) => trace!("🧹️ Scheduled sweep found nothing to do"),
                Err(SweepError::AlreadyRunning) => {
                    info!("🧹️ A manual sweep is still running. Skipping this scheduled sweep.")
                },
                Err(e) => error!("🧹️ Scheduled sweep failed. {e}"),
            }
        }
    })
}
