//! Stored entity records
//!
//! One record per natural key: `slot_id`, `vehicle_id` (per entity), and
//! `transaction_id` + `idempotency_key`. The uniqueness of these four keys is
//! what the engine's no-double-allocation and no-double-charge guarantees
//! rest on.

use carpark_types::{
    Amount, CustomerInfo, FailureReason, IdempotencyKey, PaymentMethod, SessionStatus, SlotId,
    SlotStatus, SubscriptionStatus, TransactionId, TransactionKind, TransactionStatus, VehicleId,
    VehicleType,
};
use chrono::{DateTime, Utc};

/// A physical parking slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRow {
    pub slot_id: SlotId,
    pub slot_type: VehicleType,
    pub status: SlotStatus,
    /// Set iff `status == Occupied`
    pub current_vehicle_id: Option<VehicleId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Slot provisioning input
#[derive(Debug, Clone)]
pub struct CreateSlot {
    pub slot_id: SlotId,
    pub slot_type: VehicleType,
}

/// Occupancy count for one (type, status) bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotCount {
    pub slot_type: VehicleType,
    pub status: SlotStatus,
    pub count: u64,
}

/// One stay of one vehicle, from check-in to checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRow {
    pub vehicle_id: VehicleId,
    pub license_plate: String,
    pub vehicle_type: VehicleType,
    pub slot_id: SlotId,
    pub entry_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub monthly_subscriber: bool,
}

/// Session check-in input
#[derive(Debug, Clone)]
pub struct CreateSession {
    pub vehicle_id: VehicleId,
    pub license_plate: String,
    pub vehicle_type: VehicleType,
    pub slot_id: SlotId,
    pub entry_time: DateTime<Utc>,
    pub monthly_subscriber: bool,
}

/// One payment attempt
///
/// Terminal rows (`Completed`/`Failed`) are immutable; a refund is a new
/// record with kind `Refund`, never an edit of this one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRow {
    pub transaction_id: TransactionId,
    pub idempotency_key: IdempotencyKey,
    pub vehicle_id: VehicleId,
    pub amount: Amount,
    pub kind: TransactionKind,
    pub method: PaymentMethod,
    pub status: TransactionStatus,
    pub failure_reason: Option<FailureReason>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Pending rows past this instant are eligible for expiry
    pub expires_at: DateTime<Utc>,
}

/// Transaction open input
#[derive(Debug, Clone)]
pub struct CreateTransaction {
    pub transaction_id: TransactionId,
    pub idempotency_key: IdempotencyKey,
    pub vehicle_id: VehicleId,
    pub amount: Amount,
    pub kind: TransactionKind,
    pub method: PaymentMethod,
    pub status: TransactionStatus,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A monthly parking package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRow {
    pub vehicle_id: VehicleId,
    pub license_plate: String,
    pub vehicle_type: VehicleType,
    pub customer: CustomerInfo,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub package_months: u32,
    pub package_amount: Amount,
    pub discount_percentage: u32,
    pub status: SubscriptionStatus,
    /// The held slot: `Reserved` while the subscription is `Valid` (or
    /// `Occupied` during a stay). `Expired` and `Cancelled` rows keep the
    /// last value as a renewal hint only; the slot itself has been freed
    /// and the id no longer implies a reservation.
    pub fixed_slot_id: Option<SlotId>,
    pub registered_at: DateTime<Utc>,
    pub last_renewal_at: Option<DateTime<Utc>>,
}

/// Subscription registration input
#[derive(Debug, Clone)]
pub struct CreateSubscription {
    pub vehicle_id: VehicleId,
    pub license_plate: String,
    pub vehicle_type: VehicleType,
    pub customer: CustomerInfo,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub package_months: u32,
    pub package_amount: Amount,
    pub discount_percentage: u32,
    pub fixed_slot_id: Option<SlotId>,
}

impl SubscriptionRow {
    /// Whether the subscription is usable at `now`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Valid && now < self.end_date
    }
}
