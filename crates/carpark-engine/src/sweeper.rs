//! Background maintenance
//!
//! Two periodic jobs: expiring stale pending transactions and retiring
//! lapsed subscriptions (plus advisory expiry warnings). Each pass is also
//! callable directly so tests and recovery tooling can drive it without the
//! timer loop. Storage errors are logged and the loop carries on; the next
//! tick retries whatever was missed.

use carpark_store::{
    SlotRepository, SubscriptionRepository, SubscriptionRow, TransactionRepository,
};
use std::sync::Arc;
use tokio::sync::watch;

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::gateway::{Notifier, PaymentGateway};
use crate::slots::SlotRegistry;
use crate::transactions::TransactionMachine;

/// Background maintenance sweeper
pub struct MaintenanceSweeper<S: SlotRepository, G, N> {
    store: Arc<S>,
    slots: SlotRegistry<S>,
    transactions: Arc<TransactionMachine<S, G, N>>,
    notifier: Arc<N>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl<S, G, N> MaintenanceSweeper<S, G, N>
where
    S: SlotRepository + SubscriptionRepository + TransactionRepository,
    G: PaymentGateway,
    N: Notifier,
{
    /// Create a sweeper
    pub fn new(
        store: Arc<S>,
        transactions: Arc<TransactionMachine<S, G, N>>,
        notifier: Arc<N>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let slots = SlotRegistry::new(Arc::clone(&store));
        Self { store, slots, transactions, notifier, clock, config }
    }

    /// Fail every pending transaction past its expiry instant, announcing
    /// each through the notifier so nothing waits on a dead payment forever.
    /// Returns how many were expired; rows settled mid-sweep are skipped
    /// harmlessly.
    pub async fn sweep_transactions(&self) -> EngineResult<usize> {
        let mut expired = 0;
        for txn in self.transactions.list_expired_pending().await? {
            if self.transactions.expire_if_due(&txn).await? {
                tracing::info!(txn = %txn.transaction_id, "expired stale pending transaction");
                expired += 1;
            }
        }
        Ok(expired)
    }

    /// Retire every valid subscription past its end date, freeing its fixed
    /// slot unless the vehicle is still parked in it
    pub async fn sweep_subscriptions(&self) -> EngineResult<usize> {
        let now = self.clock.now();
        let mut retired = 0;
        for sub in self.store.list_expired_valid(now).await? {
            // A concurrent renewal wins this race and the guard fails.
            if !self.store.expire_if_due(&sub.vehicle_id, now).await? {
                continue;
            }
            if let Some(slot_id) = &sub.fixed_slot_id {
                if !self.slots.free_reserved(slot_id).await? {
                    tracing::debug!(
                        slot = %slot_id,
                        "fixed slot still occupied; frees on exit"
                    );
                }
            }
            self.notifier.subscription_expired(&sub).await;
            tracing::info!(vehicle = %sub.vehicle_id, "subscription expired");
            retired += 1;
        }
        Ok(retired)
    }

    /// Send advisory warnings for packages ending within the configured
    /// window
    pub async fn warn_expiring(&self) -> EngineResult<Vec<SubscriptionRow>> {
        let now = self.clock.now();
        let expiring = self
            .store
            .list_expiring(now, self.config.expiry_warning_window)
            .await?;
        for sub in &expiring {
            let days_left = (sub.end_date - now).num_days();
            self.notifier.expiry_warning(sub, days_left).await;
        }
        Ok(expiring)
    }

    /// Run both jobs on their intervals until `shutdown` flips to `true`
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let txn_period = self
            .config
            .transaction_sweep_interval
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(300));
        let sub_period = self
            .config
            .subscription_sweep_interval
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(3600));

        let mut txn_tick = tokio::time::interval(txn_period);
        let mut sub_tick = tokio::time::interval(sub_period);
        txn_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        sub_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!("maintenance sweeper started");
        loop {
            tokio::select! {
                _ = txn_tick.tick() => {
                    if let Err(e) = self.sweep_transactions().await {
                        tracing::error!(error = %e, "transaction sweep failed");
                    }
                }
                _ = sub_tick.tick() => {
                    if let Err(e) = self.sweep_subscriptions().await {
                        tracing::error!(error = %e, "subscription sweep failed");
                    }
                    if let Err(e) = self.warn_expiring().await {
                        tracing::error!(error = %e, "expiry warning pass failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("maintenance sweeper stopping");
                        return;
                    }
                }
            }
        }
    }
}
