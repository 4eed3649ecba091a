//! Repository traits
//!
//! Async persistence interfaces for the engine entities. Methods returning
//! `bool` are atomic conditional updates: `true` means the guard held and the
//! write was applied, `false` means the record was not in the expected state
//! (callers treat that as a lost race or an idempotent no-op, never retryable
//! corruption).

use async_trait::async_trait;
use carpark_types::{
    FailureReason, IdempotencyKey, SlotId, SlotStatus, SubscriptionStatus, TransactionId,
    TransactionStatus, VehicleId, VehicleType,
};
use chrono::{DateTime, Duration, Utc};

use crate::error::StoreResult;
use crate::models::*;

/// Parking slot repository
#[async_trait]
pub trait SlotRepository: Send + Sync {
    /// Provision slots; fails with a duplicate error if any slot id exists
    async fn insert_slots(&self, slots: Vec<CreateSlot>) -> StoreResult<()>;

    /// Find a slot by id
    async fn find_by_id(&self, slot_id: &SlotId) -> StoreResult<Option<SlotRow>>;

    /// Total number of provisioned slots
    async fn count_slots(&self) -> StoreResult<u64>;

    /// Atomically claim the lowest-id `Available` slot of the given type,
    /// marking it `Occupied` by `vehicle_id`. Returns `None` when the type is
    /// full. Two concurrent claims never receive the same slot.
    async fn claim_first_available(
        &self,
        slot_type: VehicleType,
        vehicle_id: &VehicleId,
    ) -> StoreResult<Option<SlotRow>>;

    /// `Reserved` -> `Occupied` for a fixed-slot check-in; `false` if the
    /// slot is not currently reserved
    async fn occupy_reserved(&self, slot_id: &SlotId, vehicle_id: &VehicleId)
        -> StoreResult<bool>;

    /// `Occupied` -> `to` (Available or Reserved), clearing the vehicle
    /// back-reference; `false` (no-op) if the slot was not occupied
    async fn release(&self, slot_id: &SlotId, to: SlotStatus) -> StoreResult<bool>;

    /// `Available` -> `Reserved` for a monthly fixed slot; `false` if taken
    async fn reserve_if_available(&self, slot_id: &SlotId) -> StoreResult<bool>;

    /// Atomically reserve the lowest-id `Available` slot of the given type.
    /// Returns `None` when the type is full.
    async fn reserve_first_available(&self, slot_type: VehicleType)
        -> StoreResult<Option<SlotRow>>;

    /// `Reserved` -> `Available` when a subscription ends; `false` if the
    /// slot is occupied or already free
    async fn free_reserved(&self, slot_id: &SlotId) -> StoreResult<bool>;

    /// Occupancy counts grouped by (type, status)
    async fn count_by_type_and_status(&self) -> StoreResult<Vec<SlotCount>>;
}

/// Vehicle session repository
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert a new session, replacing a previous `Exited` stay for the same
    /// vehicle id (monthly vehicles re-enter under their registered id).
    /// Fails with a duplicate error if the vehicle id or the plate already
    /// has a `Parking` session.
    async fn insert(&self, session: CreateSession) -> StoreResult<SessionRow>;

    /// Find a session by vehicle id
    async fn find_by_vehicle_id(&self, vehicle_id: &VehicleId) -> StoreResult<Option<SessionRow>>;

    /// Find the `Parking` session for a plate, if any
    async fn find_active_by_plate(&self, plate: &str) -> StoreResult<Option<SessionRow>>;

    /// `Parking` -> `Exited`, setting `exit_time`; `false` (no-op) if the
    /// session is already closed
    async fn close(&self, vehicle_id: &VehicleId, exit_time: DateTime<Utc>) -> StoreResult<bool>;

    /// All sessions currently `Parking`
    async fn list_active(&self) -> StoreResult<Vec<SessionRow>>;

    /// Highest numeric suffix among vehicle ids starting with `prefix`,
    /// used to seed the id generator at startup
    async fn max_vehicle_seq(&self, prefix: &str) -> StoreResult<u64>;
}

/// Payment transaction repository
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Insert unless a row with the same idempotency key exists; in that case
    /// the existing row is returned unchanged (first-write-wins)
    async fn insert_if_absent(&self, txn: CreateTransaction) -> StoreResult<TransactionRow>;

    /// Find by transaction id
    async fn find_by_id(&self, id: &TransactionId) -> StoreResult<Option<TransactionRow>>;

    /// Find by idempotency key
    async fn find_by_idempotency_key(
        &self,
        key: &IdempotencyKey,
    ) -> StoreResult<Option<TransactionRow>>;

    /// `Pending` -> `to`, recording `reason` for failures; `false` if the
    /// row was not pending. This is the only write path out of `Pending`.
    async fn transition(
        &self,
        id: &TransactionId,
        to: TransactionStatus,
        reason: Option<FailureReason>,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Pending rows whose `expires_at` is at or before `now`
    async fn list_expired_pending(&self, now: DateTime<Utc>) -> StoreResult<Vec<TransactionRow>>;
}

/// Monthly subscription repository
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Insert a new subscription; fails with a duplicate error if the
    /// vehicle id is taken or the plate already has a `Valid` package
    async fn insert(&self, sub: CreateSubscription) -> StoreResult<SubscriptionRow>;

    /// Find by vehicle id
    async fn find_by_vehicle_id(
        &self,
        vehicle_id: &VehicleId,
    ) -> StoreResult<Option<SubscriptionRow>>;

    /// Find the `Valid` subscription for a plate, if any
    async fn find_valid_by_plate(&self, plate: &str) -> StoreResult<Option<SubscriptionRow>>;

    /// Apply a renewal: new end date, package fields, status back to `Valid`,
    /// and optionally a new fixed slot
    async fn renew(&self, renewal: ApplyRenewal) -> StoreResult<bool>;

    /// Set the subscription status (soft cancel)
    async fn set_status(&self, vehicle_id: &VehicleId, status: SubscriptionStatus)
        -> StoreResult<bool>;

    /// `Valid` -> `Expired` iff `end_date <= now`; `false` otherwise.
    /// Safe to race with a concurrent renewal.
    async fn expire_if_due(&self, vehicle_id: &VehicleId, now: DateTime<Utc>) -> StoreResult<bool>;

    /// Valid subscriptions whose end date is at or before `now`
    async fn list_expired_valid(&self, now: DateTime<Utc>) -> StoreResult<Vec<SubscriptionRow>>;

    /// Valid subscriptions ending within `window` of `now` (advisory report)
    async fn list_expiring(
        &self,
        now: DateTime<Utc>,
        window: Duration,
    ) -> StoreResult<Vec<SubscriptionRow>>;

    /// Highest numeric suffix among vehicle ids starting with `prefix`
    async fn max_vehicle_seq(&self, prefix: &str) -> StoreResult<u64>;
}

/// Renewal input for [`SubscriptionRepository::renew`]
#[derive(Debug, Clone)]
pub struct ApplyRenewal {
    pub vehicle_id: VehicleId,
    pub new_end_date: DateTime<Utc>,
    pub package_months: u32,
    pub package_amount: carpark_types::Amount,
    pub discount_percentage: u32,
    /// Present when an expired subscription gets a freshly reserved slot
    pub fixed_slot_id: Option<SlotId>,
    pub renewed_at: DateTime<Utc>,
}
