//! Monthly subscriptions
//!
//! A package buys a reserved fixed slot and free entry for its plate.
//! Registration and renewal settle their payment inline (the customer is at
//! the office); only casual checkout uses the two-step pending flow.

use carpark_store::{
    ApplyRenewal, CreateSubscription, SlotRepository, SubscriptionRepository, SubscriptionRow,
    TransactionRepository, TransactionRow,
};
use carpark_types::{
    Amount, CustomerInfo, IdempotencyKey, PaymentMethod, SlotId, SubscriptionQuote,
    SubscriptionStatus, TransactionKind, TransactionStatus, VehicleId, VehicleType,
};
use chrono::{Duration, Months};
use std::sync::Arc;

use crate::clock::Clock;
use crate::error::{EngineError, EngineResult};
use crate::fees::FeeCalculator;
use crate::gateway::{Notifier, PaymentGateway};
use crate::idgen::IdProvider;
use crate::slots::SlotRegistry;
use crate::transactions::{OpenTransaction, TransactionMachine};

/// Input for registering a monthly package
#[derive(Debug, Clone)]
pub struct RegisterSubscription {
    /// The plate the package covers
    pub license_plate: String,
    /// Vehicle type, fixing the slot type and base price
    pub vehicle_type: VehicleType,
    /// Customer contact details
    pub customer: CustomerInfo,
    /// Package duration in months
    pub months: u32,
    /// How the customer pays
    pub method: PaymentMethod,
    /// Dedup key for the payment
    pub idempotency_key: IdempotencyKey,
}

/// A completed registration or renewal
#[derive(Debug, Clone)]
pub struct SubscriptionReceipt {
    /// The subscription after the change
    pub subscription: SubscriptionRow,
    /// Price breakdown
    pub quote: SubscriptionQuote,
    /// The settled payment
    pub transaction: TransactionRow,
}

/// Monthly subscription service over the shared store
pub struct SubscriptionService<S: SlotRepository, G, N> {
    store: Arc<S>,
    slots: SlotRegistry<S>,
    transactions: Arc<TransactionMachine<S, G, N>>,
    ids: Arc<IdProvider>,
    clock: Arc<dyn Clock>,
    fees: FeeCalculator,
}

impl<S, G, N> SubscriptionService<S, G, N>
where
    S: SlotRepository + SubscriptionRepository + TransactionRepository,
    G: PaymentGateway,
    N: Notifier,
{
    /// Create a subscription service
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

    /// Price a package without committing to it
    pub fn quote(&self, vehicle_type: VehicleType, months: u32) -> EngineResult<SubscriptionQuote> {
        self.fees.quote(vehicle_type, months)
    }

    /// Register a new monthly package
    ///
    /// Reserves a fixed slot, records the subscription, then settles the
    /// payment. The record is written before the charge settles, so the
    /// plate is briefly visible as a subscriber during the settlement
    /// window; a declined charge cancels the record and frees the slot.
    #[tracing::instrument(skip(self, input), fields(plate = %input.license_plate, months = input.months))]
    pub async fn register(&self, input: RegisterSubscription) -> EngineResult<SubscriptionReceipt> {
        let plate = input.license_plate.trim().to_string();
        if plate.is_empty() {
            return Err(EngineError::InvalidArgument(
                "license plate must not be empty".to_string(),
            ));
        }
        let quote = self.fees.quote(input.vehicle_type, input.months)?;
        let now = self.clock.now();

        if let Some(existing) = self.store.find_valid_by_plate(&plate).await? {
            if existing.end_date > now {
                return Err(EngineError::SubscriptionExists(plate));
            }
            // Lapsed but unswept: retire it so the plate can re-register.
            self.retire_lapsed(&existing).await?;
        }

        let slot = self.slots.reserve(input.vehicle_type).await?;
        let prefix = input.vehicle_type.monthly_prefix();
        let mut vehicle_id = self.ids.next_vehicle_id(prefix);

        let subscription = loop {
            let create = CreateSubscription {
                vehicle_id: vehicle_id.clone(),
                license_plate: plate.clone(),
                vehicle_type: input.vehicle_type,
                customer: input.customer.clone(),
                start_date: now,
                end_date: now + Months::new(input.months),
                package_months: input.months,
                package_amount: quote.final_amount,
                discount_percentage: quote.discount_percentage,
                fixed_slot_id: Some(slot.slot_id.clone()),
            };

            match SubscriptionRepository::insert(&*self.store, create).await {
                Ok(row) => break row,
                Err(e) if e.is_duplicate() => {
                    if self.store.find_valid_by_plate(&plate).await?.is_some() {
                        self.slots.free_reserved(&slot.slot_id).await?;
                        return Err(EngineError::SubscriptionExists(plate));
                    }
                    // Vehicle-id collision: draw the next number.
                    vehicle_id = self.ids.next_vehicle_id(prefix);
                }
                Err(e) => {
                    self.slots.free_reserved(&slot.slot_id).await?;
                    return Err(e.into());
                }
            }
        };

        let transaction = match self
            .pay(
                &subscription.vehicle_id,
                quote.final_amount,
                TransactionKind::MonthlySubscription,
                input.method,
                input.idempotency_key,
                format!("{}-month package for {}", input.months, plate),
            )
            .await
        {
            Ok(txn) => txn,
            Err(e) => {
                // Unwind: the package never took effect.
                self.store
                    .set_status(&subscription.vehicle_id, SubscriptionStatus::Cancelled)
                    .await?;
                self.slots.free_reserved(&slot.slot_id).await?;
                return Err(e);
            }
        };

        tracing::info!(
            vehicle = %subscription.vehicle_id,
            slot = %slot.slot_id,
            months = input.months,
            amount = quote.final_amount,
            "subscription registered"
        );
        Ok(SubscriptionReceipt { subscription, quote, transaction })
    }

    /// Renew a package
    ///
    /// Renewing a still-valid package extends from its current end date; a
    /// lapsed package restarts from now and gets a fresh fixed slot (the old
    /// one if it is still free).
    #[tracing::instrument(skip(self, idempotency_key))]
    pub async fn renew(
        &self,
        vehicle_id: &VehicleId,
        months: u32,
        method: PaymentMethod,
        idempotency_key: IdempotencyKey,
    ) -> EngineResult<SubscriptionReceipt> {
        let mut sub = self.get(vehicle_id).await?;
        let quote = self.fees.quote(sub.vehicle_type, months)?;
        let now = self.clock.now();

        if sub.status == SubscriptionStatus::Cancelled {
            return Err(EngineError::SubscriptionCancelled(vehicle_id.clone()));
        }
        if sub.status == SubscriptionStatus::Valid && sub.end_date <= now {
            self.retire_lapsed(&sub).await?;
            sub = self.get(vehicle_id).await?;
        }

        // A lapsed package restarts from now and needs its slot back.
        let (new_end, new_slot) = if sub.status == SubscriptionStatus::Expired {
            let slot_id = self.reacquire_slot(&sub).await?;
            (now + Months::new(months), Some(slot_id))
        } else {
            (sub.end_date + Months::new(months), None)
        };

        let transaction = match self
            .pay(
                vehicle_id,
                quote.final_amount,
                TransactionKind::MonthlyRenewal,
                method,
                idempotency_key,
                format!("{months}-month renewal for {}", sub.license_plate),
            )
            .await
        {
            Ok(txn) => txn,
            Err(e) => {
                if let Some(slot_id) = &new_slot {
                    self.slots.free_reserved(slot_id).await?;
                }
                return Err(e);
            }
        };

        let applied = self
            .store
            .renew(ApplyRenewal {
                vehicle_id: vehicle_id.clone(),
                new_end_date: new_end,
                package_months: months,
                package_amount: quote.final_amount,
                discount_percentage: quote.discount_percentage,
                fixed_slot_id: new_slot,
                renewed_at: now,
            })
            .await?;
        if !applied {
            return Err(EngineError::SubscriptionNotFound(vehicle_id.clone()));
        }

        let subscription = self.get(vehicle_id).await?;
        tracing::info!(
            vehicle = %vehicle_id,
            months,
            end = %subscription.end_date,
            "subscription renewed"
        );
        Ok(SubscriptionReceipt { subscription, quote, transaction })
    }

    /// Cancel a valid package (soft; no refund)
    ///
    /// The fixed slot is released unless the vehicle is currently parked in
    /// it, in which case it frees on exit.
    pub async fn cancel(&self, vehicle_id: &VehicleId) -> EngineResult<SubscriptionRow> {
        let sub = self.get(vehicle_id).await?;
        match sub.status {
            SubscriptionStatus::Cancelled => {
                return Err(EngineError::SubscriptionCancelled(vehicle_id.clone()))
            }
            SubscriptionStatus::Expired => {
                return Err(EngineError::InvalidArgument(
                    "an expired subscription cannot be cancelled".to_string(),
                ))
            }
            SubscriptionStatus::Valid => {}
        }

        self.store
            .set_status(vehicle_id, SubscriptionStatus::Cancelled)
            .await?;
        if let Some(slot_id) = &sub.fixed_slot_id {
            self.slots.free_reserved(slot_id).await?;
        }
        tracing::info!(vehicle = %vehicle_id, "subscription cancelled");
        self.get(vehicle_id).await
    }

    /// Look up a subscription
    pub async fn get(&self, vehicle_id: &VehicleId) -> EngineResult<SubscriptionRow> {
        SubscriptionRepository::find_by_vehicle_id(&*self.store, vehicle_id)
            .await?
            .ok_or_else(|| EngineError::SubscriptionNotFound(vehicle_id.clone()))
    }

    /// Valid packages ending within `window` from now
    pub async fn expiring_within(&self, window: Duration) -> EngineResult<Vec<SubscriptionRow>> {
        Ok(self.store.list_expiring(self.clock.now(), window).await?)
    }

    async fn pay(
        &self,
        vehicle_id: &VehicleId,
        amount: Amount,
        kind: TransactionKind,
        method: PaymentMethod,
        idempotency_key: IdempotencyKey,
        description: String,
    ) -> EngineResult<TransactionRow> {
        let txn = self
            .transactions
            .open(OpenTransaction {
                idempotency_key,
                vehicle_id: vehicle_id.clone(),
                amount,
                kind,
                method,
                description,
            })
            .await?;
        if txn.status == TransactionStatus::Completed {
            // A retried request found its earlier settled payment.
            return Ok(txn);
        }
        self.transactions.settle(&txn.transaction_id).await
    }

    /// Give an expired package its slot back: the old fixed slot if still
    /// free, otherwise the lowest free slot of the type
    async fn reacquire_slot(&self, sub: &SubscriptionRow) -> EngineResult<SlotId> {
        if let Some(slot_id) = &sub.fixed_slot_id {
            if self.store.reserve_if_available(slot_id).await? {
                return Ok(slot_id.clone());
            }
        }
        Ok(self.slots.reserve(sub.vehicle_type).await?.slot_id)
    }

    async fn retire_lapsed(&self, sub: &SubscriptionRow) -> EngineResult<()> {
        if self.store.expire_if_due(&sub.vehicle_id, self.clock.now()).await? {
            if let Some(slot_id) = &sub.fixed_slot_id {
                self.slots.free_reserved(slot_id).await?;
            }
        }
        Ok(())
    }
}
