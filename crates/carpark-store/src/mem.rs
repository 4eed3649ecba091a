//! In-memory store
//!
//! Dashmap-backed implementation of all four repositories, used by tests and
//! embedded deployments. Conditional updates run their check-and-set inside
//! `get_mut`/`entry` guards, so each is atomic per key; the claim loop walks
//! candidates in slot-id order and retries the next one when it loses a race.
//!
//! Lock discipline: writers that touch an index map and an entity map always
//! take the index entry first, then the entity entry.

use async_trait::async_trait;
use carpark_types::{
    FailureReason, IdempotencyKey, SessionStatus, SlotId, SlotStatus, SubscriptionStatus,
    TransactionId, TransactionStatus, VehicleId, VehicleType,
};
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeMap;

use crate::error::{StoreError, StoreResult};
use crate::models::*;
use crate::repo::*;

/// In-memory backing store
#[derive(Default)]
pub struct MemStore {
    slots: DashMap<SlotId, SlotRow>,
    sessions: DashMap<VehicleId, SessionRow>,
    /// plate -> vehicle id of the one `Parking` session
    parking_by_plate: DashMap<String, VehicleId>,
    transactions: DashMap<TransactionId, TransactionRow>,
    /// idempotency key -> transaction id
    txn_by_key: DashMap<IdempotencyKey, TransactionId>,
    subscriptions: DashMap<VehicleId, SubscriptionRow>,
    /// plate -> vehicle id of the one `Valid` subscription
    valid_sub_by_plate: DashMap<String, VehicleId>,
}

impl MemStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

fn numeric_suffix(id: &str, prefix: &str) -> Option<u64> {
    let rest = id.strip_prefix(prefix)?;
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok()
}

#[async_trait]
impl SlotRepository for MemStore {
    async fn insert_slots(&self, slots: Vec<CreateSlot>) -> StoreResult<()> {
        let now = Utc::now();
        for slot in slots {
            match self.slots.entry(slot.slot_id.clone()) {
                Entry::Occupied(_) => {
                    return Err(StoreError::Duplicate {
                        entity: "slot",
                        key: slot.slot_id.0,
                    });
                }
                Entry::Vacant(v) => {
                    v.insert(SlotRow {
                        slot_id: slot.slot_id,
                        slot_type: slot.slot_type,
                        status: SlotStatus::Available,
                        current_vehicle_id: None,
                        created_at: now,
                        updated_at: now,
                    });
                }
            }
        }
        Ok(())
    }

    async fn find_by_id(&self, slot_id: &SlotId) -> StoreResult<Option<SlotRow>> {
        Ok(self.slots.get(slot_id).map(|r| r.value().clone()))
    }

    async fn count_slots(&self) -> StoreResult<u64> {
        Ok(self.slots.len() as u64)
    }

    async fn claim_first_available(
        &self,
        slot_type: VehicleType,
        vehicle_id: &VehicleId,
    ) -> StoreResult<Option<SlotRow>> {
        // Snapshot candidates in id order, then CAS each until one sticks.
        let candidates: BTreeMap<SlotId, ()> = self
            .slots
            .iter()
            .filter(|r| r.slot_type == slot_type && r.status == SlotStatus::Available)
            .map(|r| (r.key().clone(), ()))
            .collect();

        for slot_id in candidates.keys() {
            if let Some(mut slot) = self.slots.get_mut(slot_id) {
                if slot.status == SlotStatus::Available {
                    slot.status = SlotStatus::Occupied;
                    slot.current_vehicle_id = Some(vehicle_id.clone());
                    slot.updated_at = Utc::now();
                    return Ok(Some(slot.clone()));
                }
            }
        }
        Ok(None)
    }

    async fn occupy_reserved(
        &self,
        slot_id: &SlotId,
        vehicle_id: &VehicleId,
    ) -> StoreResult<bool> {
        if let Some(mut slot) = self.slots.get_mut(slot_id) {
            if slot.status == SlotStatus::Reserved {
                slot.status = SlotStatus::Occupied;
                slot.current_vehicle_id = Some(vehicle_id.clone());
                slot.updated_at = Utc::now();
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn release(&self, slot_id: &SlotId, to: SlotStatus) -> StoreResult<bool> {
        debug_assert!(to != SlotStatus::Occupied);
        if let Some(mut slot) = self.slots.get_mut(slot_id) {
            if slot.status == SlotStatus::Occupied {
                slot.status = to;
                slot.current_vehicle_id = None;
                slot.updated_at = Utc::now();
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn reserve_if_available(&self, slot_id: &SlotId) -> StoreResult<bool> {
        if let Some(mut slot) = self.slots.get_mut(slot_id) {
            if slot.status == SlotStatus::Available {
                slot.status = SlotStatus::Reserved;
                slot.updated_at = Utc::now();
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn reserve_first_available(
        &self,
        slot_type: VehicleType,
    ) -> StoreResult<Option<SlotRow>> {
        let candidates: BTreeMap<SlotId, ()> = self
            .slots
            .iter()
            .filter(|r| r.slot_type == slot_type && r.status == SlotStatus::Available)
            .map(|r| (r.key().clone(), ()))
            .collect();

        for slot_id in candidates.keys() {
            if let Some(mut slot) = self.slots.get_mut(slot_id) {
                if slot.status == SlotStatus::Available {
                    slot.status = SlotStatus::Reserved;
                    slot.updated_at = Utc::now();
                    return Ok(Some(slot.clone()));
                }
            }
        }
        Ok(None)
    }

    async fn free_reserved(&self, slot_id: &SlotId) -> StoreResult<bool> {
        if let Some(mut slot) = self.slots.get_mut(slot_id) {
            if slot.status == SlotStatus::Reserved {
                slot.status = SlotStatus::Available;
                slot.updated_at = Utc::now();
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn count_by_type_and_status(&self) -> StoreResult<Vec<SlotCount>> {
        let mut counts: BTreeMap<(String, String), SlotCount> = BTreeMap::new();
        for slot in self.slots.iter() {
            let key = (slot.slot_type.to_string(), slot.status.to_string());
            counts
                .entry(key)
                .or_insert(SlotCount {
                    slot_type: slot.slot_type,
                    status: slot.status,
                    count: 0,
                })
                .count += 1;
        }
        Ok(counts.into_values().collect())
    }
}

#[async_trait]
impl SessionRepository for MemStore {
    async fn insert(&self, session: CreateSession) -> StoreResult<SessionRow> {
        // Plate index entry first: it is the at-most-one-Parking guard.
        let plate_entry = match self.parking_by_plate.entry(session.license_plate.clone()) {
            Entry::Occupied(_) => {
                return Err(StoreError::Duplicate {
                    entity: "session",
                    key: session.license_plate,
                });
            }
            Entry::Vacant(v) => v,
        };

        let row = SessionRow {
            vehicle_id: session.vehicle_id.clone(),
            license_plate: session.license_plate.clone(),
            vehicle_type: session.vehicle_type,
            slot_id: session.slot_id,
            entry_time: session.entry_time,
            exit_time: None,
            status: SessionStatus::Parking,
            monthly_subscriber: session.monthly_subscriber,
        };

        match self.sessions.entry(session.vehicle_id.clone()) {
            // Monthly vehicles re-enter under their registered id; only a
            // still-open stay is a conflict.
            Entry::Occupied(existing) if existing.get().status == SessionStatus::Parking => {
                Err(StoreError::Duplicate {
                    entity: "vehicle",
                    key: session.vehicle_id.0,
                })
            }
            Entry::Occupied(mut existing) => {
                existing.insert(row.clone());
                plate_entry.insert(session.vehicle_id);
                Ok(row)
            }
            Entry::Vacant(v) => {
                v.insert(row.clone());
                plate_entry.insert(session.vehicle_id);
                Ok(row)
            }
        }
    }

    async fn find_by_vehicle_id(&self, vehicle_id: &VehicleId) -> StoreResult<Option<SessionRow>> {
        Ok(self.sessions.get(vehicle_id).map(|r| r.value().clone()))
    }

    async fn find_active_by_plate(&self, plate: &str) -> StoreResult<Option<SessionRow>> {
        Ok(self
            .parking_by_plate
            .get(plate)
            .and_then(|id| self.sessions.get(id.value()).map(|r| r.value().clone())))
    }

    async fn close(&self, vehicle_id: &VehicleId, exit_time: DateTime<Utc>) -> StoreResult<bool> {
        let plate = match self.sessions.get_mut(vehicle_id) {
            Some(mut session) if session.status == SessionStatus::Parking => {
                session.status = SessionStatus::Exited;
                session.exit_time = Some(exit_time);
                session.license_plate.clone()
            }
            _ => return Ok(false),
        };
        self.parking_by_plate.remove(&plate);
        Ok(true)
    }

    async fn list_active(&self) -> StoreResult<Vec<SessionRow>> {
        Ok(self
            .sessions
            .iter()
            .filter(|r| r.status == SessionStatus::Parking)
            .map(|r| r.value().clone())
            .collect())
    }

    async fn max_vehicle_seq(&self, prefix: &str) -> StoreResult<u64> {
        Ok(self
            .sessions
            .iter()
            .filter_map(|r| numeric_suffix(r.key().as_str(), prefix))
            .max()
            .unwrap_or(0))
    }
}

#[async_trait]
impl TransactionRepository for MemStore {
    async fn insert_if_absent(&self, txn: CreateTransaction) -> StoreResult<TransactionRow> {
        let key_entry = match self.txn_by_key.entry(txn.idempotency_key.clone()) {
            Entry::Occupied(existing) => {
                // First write wins: hand back the original, ignore the retry.
                let id = existing.get().clone();
                return self
                    .transactions
                    .get(&id)
                    .map(|r| r.value().clone())
                    .ok_or(StoreError::NotFound);
            }
            Entry::Vacant(v) => v,
        };

        let row = TransactionRow {
            transaction_id: txn.transaction_id.clone(),
            idempotency_key: txn.idempotency_key,
            vehicle_id: txn.vehicle_id,
            amount: txn.amount,
            kind: txn.kind,
            method: txn.method,
            status: txn.status,
            failure_reason: None,
            description: txn.description,
            created_at: txn.created_at,
            updated_at: txn.created_at,
            expires_at: txn.expires_at,
        };

        match self.transactions.entry(txn.transaction_id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate {
                entity: "transaction",
                key: txn.transaction_id.0,
            }),
            Entry::Vacant(v) => {
                v.insert(row.clone());
                key_entry.insert(txn.transaction_id);
                Ok(row)
            }
        }
    }

    async fn find_by_id(&self, id: &TransactionId) -> StoreResult<Option<TransactionRow>> {
        Ok(self.transactions.get(id).map(|r| r.value().clone()))
    }

    async fn find_by_idempotency_key(
        &self,
        key: &IdempotencyKey,
    ) -> StoreResult<Option<TransactionRow>> {
        Ok(self
            .txn_by_key
            .get(key)
            .and_then(|id| self.transactions.get(id.value()).map(|r| r.value().clone())))
    }

    async fn transition(
        &self,
        id: &TransactionId,
        to: TransactionStatus,
        reason: Option<FailureReason>,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        if let Some(mut txn) = self.transactions.get_mut(id) {
            if txn.status == TransactionStatus::Pending {
                txn.status = to;
                txn.failure_reason = reason;
                txn.updated_at = now;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn list_expired_pending(&self, now: DateTime<Utc>) -> StoreResult<Vec<TransactionRow>> {
        Ok(self
            .transactions
            .iter()
            .filter(|r| r.status == TransactionStatus::Pending && r.expires_at <= now)
            .map(|r| r.value().clone())
            .collect())
    }
}

#[async_trait]
impl SubscriptionRepository for MemStore {
    async fn insert(&self, sub: CreateSubscription) -> StoreResult<SubscriptionRow> {
        let plate_entry = match self.valid_sub_by_plate.entry(sub.license_plate.clone()) {
            Entry::Occupied(_) => {
                return Err(StoreError::Duplicate {
                    entity: "subscription",
                    key: sub.license_plate,
                });
            }
            Entry::Vacant(v) => v,
        };

        let row = SubscriptionRow {
            vehicle_id: sub.vehicle_id.clone(),
            license_plate: sub.license_plate.clone(),
            vehicle_type: sub.vehicle_type,
            customer: sub.customer,
            start_date: sub.start_date,
            end_date: sub.end_date,
            package_months: sub.package_months,
            package_amount: sub.package_amount,
            discount_percentage: sub.discount_percentage,
            status: SubscriptionStatus::Valid,
            fixed_slot_id: sub.fixed_slot_id,
            registered_at: sub.start_date,
            last_renewal_at: None,
        };

        match self.subscriptions.entry(sub.vehicle_id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate {
                entity: "vehicle",
                key: sub.vehicle_id.0,
            }),
            Entry::Vacant(v) => {
                v.insert(row.clone());
                plate_entry.insert(sub.vehicle_id);
                Ok(row)
            }
        }
    }

    async fn find_by_vehicle_id(
        &self,
        vehicle_id: &VehicleId,
    ) -> StoreResult<Option<SubscriptionRow>> {
        Ok(self.subscriptions.get(vehicle_id).map(|r| r.value().clone()))
    }

    async fn find_valid_by_plate(&self, plate: &str) -> StoreResult<Option<SubscriptionRow>> {
        Ok(self
            .valid_sub_by_plate
            .get(plate)
            .and_then(|id| self.subscriptions.get(id.value()).map(|r| r.value().clone()))
            .filter(|s| s.status == SubscriptionStatus::Valid))
    }

    async fn renew(&self, renewal: ApplyRenewal) -> StoreResult<bool> {
        let plate = match self.subscriptions.get_mut(&renewal.vehicle_id) {
            Some(mut sub) => {
                sub.end_date = renewal.new_end_date;
                sub.package_months = renewal.package_months;
                sub.package_amount = renewal.package_amount;
                sub.discount_percentage = renewal.discount_percentage;
                sub.status = SubscriptionStatus::Valid;
                sub.last_renewal_at = Some(renewal.renewed_at);
                if let Some(slot_id) = renewal.fixed_slot_id {
                    sub.fixed_slot_id = Some(slot_id);
                }
                sub.license_plate.clone()
            }
            None => return Ok(false),
        };
        self.valid_sub_by_plate.insert(plate, renewal.vehicle_id);
        Ok(true)
    }

    async fn set_status(
        &self,
        vehicle_id: &VehicleId,
        status: SubscriptionStatus,
    ) -> StoreResult<bool> {
        let plate = match self.subscriptions.get_mut(vehicle_id) {
            Some(mut sub) => {
                sub.status = status;
                sub.license_plate.clone()
            }
            None => return Ok(false),
        };
        if status != SubscriptionStatus::Valid {
            self.valid_sub_by_plate.remove(&plate);
        }
        Ok(true)
    }

    async fn expire_if_due(&self, vehicle_id: &VehicleId, now: DateTime<Utc>) -> StoreResult<bool> {
        let plate = match self.subscriptions.get_mut(vehicle_id) {
            Some(mut sub)
                if sub.status == SubscriptionStatus::Valid && sub.end_date <= now =>
            {
                sub.status = SubscriptionStatus::Expired;
                sub.license_plate.clone()
            }
            _ => return Ok(false),
        };
        self.valid_sub_by_plate.remove(&plate);
        Ok(true)
    }

    async fn list_expired_valid(&self, now: DateTime<Utc>) -> StoreResult<Vec<SubscriptionRow>> {
        Ok(self
            .subscriptions
            .iter()
            .filter(|r| r.status == SubscriptionStatus::Valid && r.end_date <= now)
            .map(|r| r.value().clone())
            .collect())
    }

    async fn list_expiring(
        &self,
        now: DateTime<Utc>,
        window: Duration,
    ) -> StoreResult<Vec<SubscriptionRow>> {
        let horizon = now + window;
        Ok(self
            .subscriptions
            .iter()
            .filter(|r| {
                r.status == SubscriptionStatus::Valid
                    && r.end_date > now
                    && r.end_date <= horizon
            })
            .map(|r| r.value().clone())
            .collect())
    }

    async fn max_vehicle_seq(&self, prefix: &str) -> StoreResult<u64> {
        Ok(self
            .subscriptions
            .iter()
            .filter_map(|r| numeric_suffix(r.key().as_str(), prefix))
            .max()
            .unwrap_or(0))
    }
}
