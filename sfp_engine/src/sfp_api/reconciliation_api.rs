use std::{
    fmt::Debug,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::Utc;
use log::*;

use crate::{
    db_types::{Order, SyncStatusCount},
    sfp_api::{
        errors::{LifecycleError, SweepError},
        lifecycle_api::OrderLifecycleApi,
        order_objects::{ReconcileOutcome, SweepResult},
    },
    traits::{GatewayError, PaymentGateway, PaymentIntent, StorefrontDatabase},
};

pub const DEFAULT_MIN_RETRY_GAP: Duration = Duration::from_secs(300);
pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy)]
pub struct SweepConfig {
    /// A processing order is not re-checked until at least this long after its previous sync attempt. Provisional
    /// orders are always checked.
    pub min_retry_gap: Duration,
    /// Upper bound on each gateway call made during a sweep.
    pub gateway_timeout: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self { min_retry_gap: DEFAULT_MIN_RETRY_GAP, gateway_timeout: DEFAULT_GATEWAY_TIMEOUT }
    }
}

/// Repairs orders that the webhook never settled.
///
/// A sweep asks the gateway about every stale order and feeds the answer back through [`OrderLifecycleApi`]. Errors
/// for one order are logged and counted; they never abort the sweep. Only one sweep runs at a time across all clones
/// of a sweeper.
pub struct ReconciliationSweeper<B, G> {
    lifecycle: OrderLifecycleApi<B>,
    gateway: G,
    config: SweepConfig,
    running: Arc<AtomicBool>,
}

impl<B, G> Debug for ReconciliationSweeper<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationSweeper({:?})", self.config)
    }
}

impl<B: Clone, G: Clone> Clone for ReconciliationSweeper<B, G> {
    fn clone(&self) -> Self {
        Self {
            lifecycle: self.lifecycle.clone(),
            gateway: self.gateway.clone(),
            config: self.config,
            running: Arc::clone(&self.running),
        }
    }
}

/// Clears the in-flight flag when the sweep ends, including when the sweep future is dropped part way through.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).ok().map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<B, G> ReconciliationSweeper<B, G> {
    pub fn new(db: B, gateway: G, config: SweepConfig) -> Self {
        Self { lifecycle: OrderLifecycleApi::new(db), gateway, config, running: Arc::new(AtomicBool::new(false)) }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }
}

impl<B, G> ReconciliationSweeper<B, G>
where
    B: StorefrontDatabase,
    G: PaymentGateway,
{
    /// Runs one sweep over all stale orders.
    ///
    /// Candidates are every provisional order, plus every processing order that has not been synced within
    /// `min_retry_gap`. Returns [`SweepError::AlreadyRunning`] without doing anything if another sweep is in flight.
    pub async fn sweep(&self) -> Result<SweepResult, SweepError> {
        let _guard = InFlightGuard::acquire(&self.running).ok_or(SweepError::AlreadyRunning)?;
        let gap = chrono::Duration::from_std(self.config.min_retry_gap).unwrap_or(chrono::Duration::zero());
        let cutoff = Utc::now() - gap;
        let candidates = self.lifecycle.db().fetch_sweep_candidates(cutoff).await?;
        if candidates.is_empty() {
            trace!("🧹️ No stale orders. Sweep complete.");
            return Ok(SweepResult::default());
        }
        info!("🧹️ Reconciling {} stale orders with the gateway", candidates.len());
        let mut result = SweepResult::default();
        for order in candidates {
            let success = match self.reconcile(&order).await {
                Ok(ReconcileOutcome::Synced(o)) => {
                    debug!("🧹️ {o} synced");
                    result.synced += 1;
                    true
                },
                Ok(ReconcileOutcome::Pending(_)) | Ok(ReconcileOutcome::NoOrder) => {
                    trace!("🧹️ {order} is still pending at the gateway");
                    result.skipped += 1;
                    true
                },
                Err(e) => {
                    warn!("🧹️ Could not reconcile {order}. {e}");
                    result.failed += 1;
                    false
                },
            };
            if let Err(e) = self.lifecycle.mark_sync_attempt(order.id, success).await {
                error!("🧹️ Could not record the sync attempt for {order}. {e}");
            }
        }
        info!(
            "🧹️ Sweep complete. {} synced, {} failed, {} still pending",
            result.synced, result.failed, result.skipped
        );
        Ok(result)
    }

    /// Reconciles a single order on demand, whether or not it is due for a sweep.
    ///
    /// An order that is missing locally but has succeeded at the gateway is created from the payment's metadata.
    pub async fn resync_order(&self, payment_reference: &str) -> Result<ReconcileOutcome, LifecycleError> {
        let existing = self.lifecycle.db().fetch_order_by_payment_reference(payment_reference).await?;
        let result = match self.fetch_intent(payment_reference).await {
            Ok(intent) => self.lifecycle.apply_gateway_status(&intent).await,
            Err(e) => Err(e.into()),
        };
        let order_id = match (&result, &existing) {
            (Ok(ReconcileOutcome::Synced(o)), _) | (Ok(ReconcileOutcome::Pending(o)), _) => Some(o.id),
            (_, Some(o)) => Some(o.id),
            _ => None,
        };
        if let Some(id) = order_id {
            if let Err(e) = self.lifecycle.mark_sync_attempt(id, result.is_ok()).await {
                error!("🧹️ Could not record the sync attempt for order #{id}. {e}");
            }
        }
        match &result {
            Ok(outcome) => info!("🧹️ Manual resync of [{payment_reference}]: {outcome:?}"),
            Err(e) => warn!("🧹️ Manual resync of [{payment_reference}] failed. {e}"),
        }
        result
    }

    pub async fn statistics(&self) -> Result<Vec<SyncStatusCount>, LifecycleError> {
        let stats = self.lifecycle.db().sync_statistics().await?;
        Ok(stats)
    }

    async fn reconcile(&self, order: &Order) -> Result<ReconcileOutcome, LifecycleError> {
        let intent = self.fetch_intent(&order.payment_reference).await?;
        self.lifecycle.apply_gateway_status(&intent).await
    }

    async fn fetch_intent(&self, payment_reference: &str) -> Result<PaymentIntent, GatewayError> {
        let call = self.gateway.retrieve_payment_intent(payment_reference);
        tokio::time::timeout(self.config.gateway_timeout, call).await.map_err(|_| GatewayError::Timeout)?
    }
}
