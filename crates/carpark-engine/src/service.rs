//! Engine facade
//!
//! Wires the id generator, transaction machine, session manager,
//! subscription service, and sweeper over one shared store.

use carpark_store::{
    SessionRepository, SlotRepository, SubscriptionRepository, TransactionRepository,
};
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::fees::FeeCalculator;
use crate::gateway::{Notifier, PaymentGateway};
use crate::idgen::IdProvider;
use crate::sessions::SessionManager;
use crate::slots::SlotRegistry;
use crate::subscriptions::SubscriptionService;
use crate::sweeper::MaintenanceSweeper;
use crate::transactions::TransactionMachine;

/// The assembled parking engine
pub struct ParkingService<S: SlotRepository, G, N> {
    /// Slot inventory
    pub slots: SlotRegistry<S>,
    /// Check-in and checkout
    pub sessions: SessionManager<S, G, N>,
    /// Monthly packages
    pub subscriptions: SubscriptionService<S, G, N>,
    /// Payment state machine
    pub transactions: Arc<TransactionMachine<S, G, N>>,
    /// Background maintenance
    pub sweeper: MaintenanceSweeper<S, G, N>,
}

impl<S, G, N> ParkingService<S, G, N>
where
    S: SlotRepository
        + SessionRepository
        + SubscriptionRepository
        + TransactionRepository
        + 'static,
    G: PaymentGateway,
    N: Notifier,
{
    /// Assemble the engine over a store
    ///
    /// Seeds the vehicle id counters from the store's high-water marks so a
    /// restart never reissues an id.
    pub async fn new(
        store: Arc<S>,
        gateway: Arc<G>,
        notifier: Arc<N>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> EngineResult<Self> {
        config.validate()?;

        let ids = Arc::new(IdProvider::new());
        for prefix in ["M", "C"] {
            let high = SessionRepository::max_vehicle_seq(&*store, prefix).await?;
            ids.seed(prefix, high);
        }
        for prefix in ["MM", "MC"] {
            let high = SubscriptionRepository::max_vehicle_seq(&*store, prefix).await?;
            ids.seed(prefix, high);
        }

        let fees = FeeCalculator::new(config.fees.clone());
        let transactions = Arc::new(TransactionMachine::new(
            Arc::clone(&store),
            gateway,
            Arc::clone(&notifier),
            Arc::clone(&ids),
            Arc::clone(&clock),
            config.pending_ttl,
        ));

        Ok(Self {
            slots: SlotRegistry::new(Arc::clone(&store)),
            sessions: SessionManager::new(
                Arc::clone(&store),
                Arc::clone(&transactions),
                Arc::clone(&ids),
                Arc::clone(&clock),
                fees.clone(),
            ),
            subscriptions: SubscriptionService::new(
                Arc::clone(&store),
                Arc::clone(&transactions),
                Arc::clone(&ids),
                Arc::clone(&clock),
                fees,
            ),
            sweeper: MaintenanceSweeper::new(
                store,
                Arc::clone(&transactions),
                notifier,
                clock,
                config,
            ),
            transactions,
        })
    }
}
