//! Common test utilities for carpark-engine integration tests

use async_trait::async_trait;
use carpark_engine::{
    ChargeOutcome, Clock, EngineConfig, EngineResult, ManualClock, Notifier, ParkingService,
    PaymentGateway,
};
use carpark_store::{MemStore, SubscriptionRow, TransactionRow};
use carpark_types::{CustomerInfo, TransactionId, VehicleId};
use chrono::{TimeZone, Utc};
use std::sync::{Arc, Mutex};

/// Gateway whose next verdict is scripted by the test
#[derive(Default)]
pub struct ScriptedGateway {
    decline: Mutex<Option<String>>,
    charges: Mutex<Vec<TransactionRow>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent charges fail with `reason`
    pub fn decline_with(&self, reason: &str) {
        *self.decline.lock().unwrap() = Some(reason.to_string());
    }

    /// Go back to approving charges
    pub fn approve(&self) {
        *self.decline.lock().unwrap() = None;
    }

    /// Every transaction the gateway was asked to charge
    pub fn charges(&self) -> Vec<TransactionRow> {
        self.charges.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn charge(&self, transaction: &TransactionRow) -> EngineResult<ChargeOutcome> {
        self.charges.lock().unwrap().push(transaction.clone());
        Ok(match self.decline.lock().unwrap().clone() {
            Some(reason) => ChargeOutcome::Declined(reason),
            None => ChargeOutcome::Approved,
        })
    }
}

/// Notifier that records everything it is asked to send
#[derive(Default)]
pub struct RecordingNotifier {
    pub completed_txns: Mutex<Vec<TransactionId>>,
    pub expired_txns: Mutex<Vec<TransactionId>>,
    pub warnings: Mutex<Vec<(VehicleId, i64)>>,
    pub expirations: Mutex<Vec<VehicleId>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completed_transactions(&self) -> Vec<TransactionId> {
        self.completed_txns.lock().unwrap().clone()
    }

    pub fn expired_transactions(&self) -> Vec<TransactionId> {
        self.expired_txns.lock().unwrap().clone()
    }

    pub fn warned(&self) -> Vec<(VehicleId, i64)> {
        self.warnings.lock().unwrap().clone()
    }

    pub fn expired(&self) -> Vec<VehicleId> {
        self.expirations.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn transaction_completed(&self, transaction: &TransactionRow) {
        self.completed_txns
            .lock()
            .unwrap()
            .push(transaction.transaction_id.clone());
    }

    async fn transaction_expired(&self, transaction: &TransactionRow) {
        self.expired_txns
            .lock()
            .unwrap()
            .push(transaction.transaction_id.clone());
    }

    async fn expiry_warning(&self, subscription: &SubscriptionRow, days_left: i64) {
        self.warnings
            .lock()
            .unwrap()
            .push((subscription.vehicle_id.clone(), days_left));
    }

    async fn subscription_expired(&self, subscription: &SubscriptionRow) {
        self.expirations
            .lock()
            .unwrap()
            .push(subscription.vehicle_id.clone());
    }
}

/// Everything a test needs: an assembled engine over the in-memory store
/// with a hand-driven clock and scripted gateway
pub struct Harness {
    pub store: Arc<MemStore>,
    pub clock: Arc<ManualClock>,
    pub gateway: Arc<ScriptedGateway>,
    pub notifier: Arc<RecordingNotifier>,
    pub engine: ParkingService<MemStore, ScriptedGateway, RecordingNotifier>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(EngineConfig::default()).await
    }

    pub async fn with_config(config: EngineConfig) -> Self {
        let store = Arc::new(MemStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 1, 6, 8, 0, 0).unwrap(),
        ));
        let gateway = Arc::new(ScriptedGateway::new());
        let notifier = Arc::new(RecordingNotifier::new());

        let engine = ParkingService::new(
            Arc::clone(&store),
            Arc::clone(&gateway),
            Arc::clone(&notifier),
            Arc::clone(&clock) as Arc<dyn Clock>,
            config,
        )
        .await
        .expect("engine assembly");

        Self { store, clock, gateway, notifier, engine }
    }

    /// Provision a small facility
    pub async fn provision(&self, motorbike_slots: u32, car_slots: u32) {
        self.engine
            .slots
            .provision(motorbike_slots, car_slots)
            .await
            .expect("provision");
    }
}

/// A throwaway customer
pub fn customer() -> CustomerInfo {
    CustomerInfo {
        name: "Nguyen Van A".to_string(),
        phone: "0901234567".to_string(),
        email: "a.nguyen@example.com".to_string(),
    }
}
