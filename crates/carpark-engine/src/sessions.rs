//! Parking sessions
//!
//! Check-in allocates a slot and opens a session; checkout computes the fee
//! and hands back a pending transaction, and the session only closes once
//! that transaction settles. Monthly subscribers skip billing entirely and
//! park in their reserved fixed slot.

use carpark_store::{
    CreateSession, SessionRepository, SessionRow, SlotRepository, SubscriptionRepository,
    TransactionRepository, TransactionRow,
};
use carpark_types::{
    Amount, IdempotencyKey, PaymentMethod, SessionStatus, SlotStatus, TransactionId,
    TransactionKind, TransactionStatus, VehicleId, VehicleType,
};
use std::sync::Arc;

use crate::clock::Clock;
use crate::error::{EngineError, EngineResult};
use crate::fees::FeeCalculator;
use crate::gateway::{Notifier, PaymentGateway};
use crate::idgen::IdProvider;
use crate::slots::SlotRegistry;
use crate::transactions::{OpenTransaction, TransactionMachine};

/// What a checkout produced
#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    /// The session being closed
    pub session: SessionRow,
    /// Fee owed; zero for monthly subscribers
    pub amount_due: Amount,
    /// Pending payment to settle, absent for free monthly exits
    pub transaction: Option<TransactionRow>,
}

/// Session manager over the shared store
pub struct SessionManager<S: SlotRepository, G, N> {
    store: Arc<S>,
    slots: SlotRegistry<S>,
    transactions: Arc<TransactionMachine<S, G, N>>,
    ids: Arc<IdProvider>,
    clock: Arc<dyn Clock>,
    fees: FeeCalculator,
}

impl<S, G, N> SessionManager<S, G, N>
where
    S: SlotRepository + SessionRepository + SubscriptionRepository + TransactionRepository,
    G: PaymentGateway,
    N: Notifier,
{
    /// Create a session manager
    pub fn new(
        store: Arc<S>,
        transactions: Arc<TransactionMachine<S, G, N>>,
        ids: Arc<IdProvider>,
        clock: Arc<dyn Clock>,
        fees: FeeCalculator,
    ) -> Self {
        let slots = SlotRegistry::new(Arc::clone(&store));
        Self { store, slots, transactions, ids, clock, fees }
    }

    /// Check a vehicle in
    ///
    /// A plate holding a valid monthly package enters free into its reserved
    /// fixed slot under its registered vehicle id; anyone else gets a fresh
    /// casual id and the lowest free slot of their type. A plate that is
    /// already inside is rejected.
    #[tracing::instrument(skip(self))]
    pub async fn check_in(&self, license_plate: &str, vehicle_type: VehicleType) -> EngineResult<SessionRow> {
        let plate = license_plate.trim();
        if plate.is_empty() {
            return Err(EngineError::InvalidArgument(
                "license plate must not be empty".to_string(),
            ));
        }

        if let Some(open) = self.store.find_active_by_plate(plate).await? {
            return Err(EngineError::DuplicateActiveSession {
                license_plate: plate.to_string(),
                existing: open.vehicle_id,
            });
        }

        if let Some(sub) = self.store.find_valid_by_plate(plate).await? {
            let now = self.clock.now();
            if sub.end_date <= now {
                // Lapsed but not yet swept: retire it here and fall through
                // to a casual stay.
                self.retire_lapsed(&sub).await?;
            } else {
                if sub.vehicle_type != vehicle_type {
                    return Err(EngineError::InvalidArgument(format!(
                        "plate {plate} is registered as a {}",
                        sub.vehicle_type
                    )));
                }
                return self.check_in_monthly(plate, &sub).await;
            }
        }

        self.check_in_casual(plate, vehicle_type).await
    }

    async fn check_in_monthly(
        &self,
        plate: &str,
        sub: &carpark_store::SubscriptionRow,
    ) -> EngineResult<SessionRow> {
        // `unwind_to` is where the slot goes if the insert below loses a
        // race: back to Reserved for the fixed slot, back to the free pool
        // for a general claim.
        let (slot_id, unwind_to) = match &sub.fixed_slot_id {
            Some(slot_id) => match self.slots.occupy_reserved(slot_id, &sub.vehicle_id).await {
                Ok(()) => (slot_id.clone(), SlotStatus::Reserved),
                Err(EngineError::SlotNotAvailable(_)) => {
                    // The fixed slot is taken (operator override, stale
                    // reservation); park in the general pool for this visit.
                    tracing::warn!(
                        vehicle = %sub.vehicle_id,
                        slot = %slot_id,
                        "fixed slot unavailable, claiming a general slot"
                    );
                    let slot = self.slots.claim(sub.vehicle_type, &sub.vehicle_id).await?;
                    (slot.slot_id, SlotStatus::Available)
                }
                Err(e) => return Err(e),
            },
            // A package without a held slot parks wherever is free.
            None => {
                let slot = self.slots.claim(sub.vehicle_type, &sub.vehicle_id).await?;
                (slot.slot_id, SlotStatus::Available)
            }
        };

        let create = CreateSession {
            vehicle_id: sub.vehicle_id.clone(),
            license_plate: plate.to_string(),
            vehicle_type: sub.vehicle_type,
            slot_id: slot_id.clone(),
            entry_time: self.clock.now(),
            monthly_subscriber: true,
        };

        match SessionRepository::insert(&*self.store, create).await {
            Ok(session) => {
                tracing::info!(vehicle = %session.vehicle_id, slot = %slot_id, "monthly check-in");
                Ok(session)
            }
            Err(e) if e.is_duplicate() => {
                // Lost a race on the plate or the vehicle id; hand the slot back.
                self.slots.release(&slot_id, unwind_to).await?;
                Err(self.duplicate_session_error(plate, &sub.vehicle_id).await)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn check_in_casual(
        &self,
        plate: &str,
        vehicle_type: VehicleType,
    ) -> EngineResult<SessionRow> {
        let prefix = vehicle_type.casual_prefix();
        let first_id = self.ids.next_vehicle_id(prefix);
        let slot = self.slots.claim(vehicle_type, &first_id).await?;

        // The insert is the id-uniqueness authority: a vehicle-id collision
        // (counter seeded behind existing rows) draws the next number.
        let mut vehicle_id = first_id;
        for _ in 0..3 {
            let create = CreateSession {
                vehicle_id: vehicle_id.clone(),
                license_plate: plate.to_string(),
                vehicle_type,
                slot_id: slot.slot_id.clone(),
                entry_time: self.clock.now(),
                monthly_subscriber: false,
            };

            match SessionRepository::insert(&*self.store, create).await {
                Ok(session) => {
                    tracing::info!(
                        vehicle = %session.vehicle_id,
                        slot = %slot.slot_id,
                        "casual check-in"
                    );
                    return Ok(session);
                }
                Err(e) if e.is_duplicate() => {
                    if let Some(open) = self.store.find_active_by_plate(plate).await? {
                        self.slots.release(&slot.slot_id, SlotStatus::Available).await?;
                        return Err(EngineError::DuplicateActiveSession {
                            license_plate: plate.to_string(),
                            existing: open.vehicle_id,
                        });
                    }
                    vehicle_id = self.ids.next_vehicle_id(prefix);
                }
                Err(e) => {
                    self.slots.release(&slot.slot_id, SlotStatus::Available).await?;
                    return Err(e.into());
                }
            }
        }

        self.slots.release(&slot.slot_id, SlotStatus::Available).await?;
        Err(EngineError::InvalidArgument(
            "could not allocate a unique vehicle id".to_string(),
        ))
    }

    /// Begin checkout for a parked vehicle
    ///
    /// Monthly subscribers exit immediately and their fixed slot flips back
    /// to `Reserved`. Casual vehicles get a pending parking-fee transaction;
    /// the session stays open until [`Self::complete_checkout`] settles it.
    #[tracing::instrument(skip(self, idempotency_key))]
    pub async fn checkout(
        &self,
        vehicle_id: &VehicleId,
        method: PaymentMethod,
        idempotency_key: IdempotencyKey,
    ) -> EngineResult<CheckoutOutcome> {
        let session = self.get_session(vehicle_id).await?;
        if session.status == SessionStatus::Exited {
            return Err(EngineError::SessionClosed(vehicle_id.clone()));
        }

        if session.monthly_subscriber {
            let now = self.clock.now();
            // The slot stays reserved only while the package is alive and
            // this is actually its fixed slot (a fallback stay in a general
            // slot frees normally); a lapsed subscriber's exit is what
            // finally frees its fixed slot.
            let keep_reserved =
                SubscriptionRepository::find_by_vehicle_id(&*self.store, vehicle_id)
                    .await?
                    .map(|sub| {
                        sub.is_valid_at(now)
                            && sub.fixed_slot_id.as_ref() == Some(&session.slot_id)
                    })
                    .unwrap_or(false);
            let freed_to = if keep_reserved { SlotStatus::Reserved } else { SlotStatus::Available };

            self.store.close(vehicle_id, now).await?;
            self.slots.release(&session.slot_id, freed_to).await?;
            tracing::info!(vehicle = %vehicle_id, "monthly checkout");

            let mut closed = session;
            closed.status = SessionStatus::Exited;
            closed.exit_time = Some(now);
            return Ok(CheckoutOutcome { session: closed, amount_due: 0, transaction: None });
        }

        let amount = self.fees.casual_fee(session.vehicle_type);
        let txn = self
            .transactions
            .open(OpenTransaction {
                idempotency_key,
                vehicle_id: vehicle_id.clone(),
                amount,
                kind: TransactionKind::ParkingFee,
                method,
                description: format!(
                    "parking fee for {} ({})",
                    session.license_plate, session.vehicle_id
                ),
            })
            .await?;

        Ok(CheckoutOutcome { session, amount_due: amount, transaction: Some(txn) })
    }

    /// Settle a checkout's pending fee and close the session
    pub async fn complete_checkout(
        &self,
        transaction_id: &TransactionId,
    ) -> EngineResult<SessionRow> {
        let txn = self.transactions.get(transaction_id).await?;
        if txn.kind != TransactionKind::ParkingFee {
            return Err(EngineError::InvalidArgument(format!(
                "transaction {transaction_id} is not a parking fee"
            )));
        }

        match self.transactions.settle(transaction_id).await {
            Ok(_) => {}
            // Already completed: resume the close that a crash interrupted.
            Err(EngineError::AlreadyTerminal { status: TransactionStatus::Completed, .. }) => {}
            Err(e) => return Err(e),
        }

        let session = self.get_session(&txn.vehicle_id).await?;
        if session.status == SessionStatus::Parking {
            let now = self.clock.now();
            self.store.close(&txn.vehicle_id, now).await?;
            self.slots.release(&session.slot_id, SlotStatus::Available).await?;
            tracing::info!(vehicle = %txn.vehicle_id, txn = %transaction_id, "casual checkout");
        }
        self.get_session(&txn.vehicle_id).await
    }

    /// Look up a session
    pub async fn get_session(&self, vehicle_id: &VehicleId) -> EngineResult<SessionRow> {
        SessionRepository::find_by_vehicle_id(&*self.store, vehicle_id)
            .await?
            .ok_or_else(|| EngineError::SessionNotFound(vehicle_id.clone()))
    }

    /// All vehicles currently inside
    pub async fn parked_vehicles(&self) -> EngineResult<Vec<SessionRow>> {
        Ok(self.store.list_active().await?)
    }

    async fn retire_lapsed(&self, sub: &carpark_store::SubscriptionRow) -> EngineResult<()> {
        if self.store.expire_if_due(&sub.vehicle_id, self.clock.now()).await? {
            if let Some(slot_id) = &sub.fixed_slot_id {
                self.slots.free_reserved(slot_id).await?;
            }
            tracing::info!(vehicle = %sub.vehicle_id, "subscription lapsed at check-in");
        }
        Ok(())
    }

    async fn duplicate_session_error(&self, plate: &str, fallback: &VehicleId) -> EngineError {
        let existing = match self.store.find_active_by_plate(plate).await {
            Ok(Some(open)) => open.vehicle_id,
            _ => fallback.clone(),
        };
        EngineError::DuplicateActiveSession {
            license_plate: plate.to_string(),
            existing,
        }
    }
}
