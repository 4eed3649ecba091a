//! PostgreSQL repository implementations

mod session;
mod slot;
mod subscription;
mod transaction;

pub use session::PgSessionRepository;
pub use slot::PgSlotRepository;
pub use subscription::PgSubscriptionRepository;
pub use transaction::PgTransactionRepository;

use crate::error::StoreError;
use crate::DbPool;

/// All repositories bundled together
#[derive(Clone)]
pub struct PgStore {
    pub slots: PgSlotRepository,
    pub sessions: PgSessionRepository,
    pub transactions: PgTransactionRepository,
    pub subscriptions: PgSubscriptionRepository,
}

impl PgStore {
    /// Create all repositories from a database pool
    pub fn new(pool: DbPool) -> Self {
        Self {
            slots: PgSlotRepository::new(pool.clone()),
            sessions: PgSessionRepository::new(pool.clone()),
            transactions: PgTransactionRepository::new(pool.clone()),
            subscriptions: PgSubscriptionRepository::new(pool),
        }
    }
}

// The engine's services are generic over one store type; PgStore satisfies
// all four repository traits by forwarding to its per-entity repositories.

use async_trait::async_trait;
use carpark_types::{
    FailureReason, IdempotencyKey, SlotId, SlotStatus, SubscriptionStatus, TransactionId,
    TransactionStatus, VehicleId, VehicleType,
};
use chrono::{DateTime, Duration, Utc};

use crate::error::StoreResult;
use crate::models::*;
use crate::repo::{
    ApplyRenewal, SessionRepository, SlotRepository, SubscriptionRepository,
    TransactionRepository,
};

#[async_trait]
impl SlotRepository for PgStore {
    async fn insert_slots(&self, slots: Vec<CreateSlot>) -> StoreResult<()> {
        self.slots.insert_slots(slots).await
    }

    async fn find_by_id(&self, slot_id: &SlotId) -> StoreResult<Option<SlotRow>> {
        self.slots.find_by_id(slot_id).await
    }

    async fn count_slots(&self) -> StoreResult<u64> {
        self.slots.count_slots().await
    }

    async fn claim_first_available(
        &self,
        slot_type: VehicleType,
        vehicle_id: &VehicleId,
    ) -> StoreResult<Option<SlotRow>> {
        self.slots.claim_first_available(slot_type, vehicle_id).await
    }

    async fn occupy_reserved(
        &self,
        slot_id: &SlotId,
        vehicle_id: &VehicleId,
    ) -> StoreResult<bool> {
        self.slots.occupy_reserved(slot_id, vehicle_id).await
    }

    async fn release(&self, slot_id: &SlotId, to: SlotStatus) -> StoreResult<bool> {
        self.slots.release(slot_id, to).await
    }

    async fn reserve_if_available(&self, slot_id: &SlotId) -> StoreResult<bool> {
        self.slots.reserve_if_available(slot_id).await
    }

    async fn reserve_first_available(
        &self,
        slot_type: VehicleType,
    ) -> StoreResult<Option<SlotRow>> {
        self.slots.reserve_first_available(slot_type).await
    }

    async fn free_reserved(&self, slot_id: &SlotId) -> StoreResult<bool> {
        self.slots.free_reserved(slot_id).await
    }

    async fn count_by_type_and_status(&self) -> StoreResult<Vec<SlotCount>> {
        self.slots.count_by_type_and_status().await
    }
}

#[async_trait]
impl SessionRepository for PgStore {
    async fn insert(&self, session: CreateSession) -> StoreResult<SessionRow> {
        self.sessions.insert(session).await
    }

    async fn find_by_vehicle_id(&self, vehicle_id: &VehicleId) -> StoreResult<Option<SessionRow>> {
        SessionRepository::find_by_vehicle_id(&self.sessions, vehicle_id).await
    }

    async fn find_active_by_plate(&self, plate: &str) -> StoreResult<Option<SessionRow>> {
        self.sessions.find_active_by_plate(plate).await
    }

    async fn close(&self, vehicle_id: &VehicleId, exit_time: DateTime<Utc>) -> StoreResult<bool> {
        self.sessions.close(vehicle_id, exit_time).await
    }

    async fn list_active(&self) -> StoreResult<Vec<SessionRow>> {
        self.sessions.list_active().await
    }

    async fn max_vehicle_seq(&self, prefix: &str) -> StoreResult<u64> {
        SessionRepository::max_vehicle_seq(&self.sessions, prefix).await
    }
}

#[async_trait]
impl TransactionRepository for PgStore {
    async fn insert_if_absent(&self, txn: CreateTransaction) -> StoreResult<TransactionRow> {
        self.transactions.insert_if_absent(txn).await
    }

    async fn find_by_id(&self, id: &TransactionId) -> StoreResult<Option<TransactionRow>> {
        self.transactions.find_by_id(id).await
    }

    async fn find_by_idempotency_key(
        &self,
        key: &IdempotencyKey,
    ) -> StoreResult<Option<TransactionRow>> {
        self.transactions.find_by_idempotency_key(key).await
    }

    async fn transition(
        &self,
        id: &TransactionId,
        to: TransactionStatus,
        reason: Option<FailureReason>,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.transactions.transition(id, to, reason, now).await
    }

    async fn list_expired_pending(&self, now: DateTime<Utc>) -> StoreResult<Vec<TransactionRow>> {
        self.transactions.list_expired_pending(now).await
    }
}

#[async_trait]
impl SubscriptionRepository for PgStore {
    async fn insert(&self, sub: CreateSubscription) -> StoreResult<SubscriptionRow> {
        self.subscriptions.insert(sub).await
    }

    async fn find_by_vehicle_id(
        &self,
        vehicle_id: &VehicleId,
    ) -> StoreResult<Option<SubscriptionRow>> {
        SubscriptionRepository::find_by_vehicle_id(&self.subscriptions, vehicle_id).await
    }

    async fn find_valid_by_plate(&self, plate: &str) -> StoreResult<Option<SubscriptionRow>> {
        self.subscriptions.find_valid_by_plate(plate).await
    }

    async fn renew(&self, renewal: ApplyRenewal) -> StoreResult<bool> {
        self.subscriptions.renew(renewal).await
    }

    async fn set_status(
        &self,
        vehicle_id: &VehicleId,
        status: SubscriptionStatus,
    ) -> StoreResult<bool> {
        self.subscriptions.set_status(vehicle_id, status).await
    }

    async fn expire_if_due(&self, vehicle_id: &VehicleId, now: DateTime<Utc>) -> StoreResult<bool> {
        self.subscriptions.expire_if_due(vehicle_id, now).await
    }

    async fn list_expired_valid(&self, now: DateTime<Utc>) -> StoreResult<Vec<SubscriptionRow>> {
        self.subscriptions.list_expired_valid(now).await
    }

    async fn list_expiring(
        &self,
        now: DateTime<Utc>,
        window: Duration,
    ) -> StoreResult<Vec<SubscriptionRow>> {
        self.subscriptions.list_expiring(now, window).await
    }

    async fn max_vehicle_seq(&self, prefix: &str) -> StoreResult<u64> {
        SubscriptionRepository::max_vehicle_seq(&self.subscriptions, prefix).await
    }
}

/// Map a unique-constraint violation onto the natural-key duplicate error;
/// every other database failure passes through
pub(crate) fn map_insert_err(err: sqlx::Error, entity: &'static str, key: &str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return StoreError::Duplicate {
                entity,
                key: key.to_string(),
            };
        }
    }
    StoreError::Sqlx(err)
}

/// Parse a stored enum column, surfacing bad values as decode errors
pub(crate) fn parse_col<T>(column: &'static str, raw: &str) -> Result<T, StoreError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| StoreError::Decode(format!("{column}: {e}")))
}
