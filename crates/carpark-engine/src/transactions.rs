//! Payment transaction state machine
//!
//! Transactions move `Pending -> Completed` or `Pending -> Failed` and never
//! leave a terminal state. Opening is idempotent on the caller's key, so a
//! retried request returns the original row instead of charging twice.

use carpark_store::{CreateTransaction, TransactionRepository, TransactionRow};
use carpark_types::{
    Amount, FailureReason, IdempotencyKey, PaymentMethod, TransactionId, TransactionKind,
    TransactionStatus, VehicleId,
};
use chrono::Duration;
use std::sync::Arc;

use crate::clock::Clock;
use crate::error::{EngineError, EngineResult};
use crate::gateway::{ChargeOutcome, Notifier, PaymentGateway};
use crate::idgen::IdProvider;

/// Input for opening a payment transaction
#[derive(Debug, Clone)]
pub struct OpenTransaction {
    /// Caller-supplied dedup key
    pub idempotency_key: IdempotencyKey,
    /// The vehicle being charged
    pub vehicle_id: VehicleId,
    /// Amount due
    pub amount: Amount,
    /// What the charge is for
    pub kind: TransactionKind,
    /// How the customer pays
    pub method: PaymentMethod,
    /// Human-readable line for receipts
    pub description: String,
}

/// Payment transaction state machine over a [`TransactionRepository`]
///
/// Settlement outcomes are returned to the caller and also announced through
/// the [`Notifier`], so the invoice side hears about completions and expiries
/// whether the transition came from a foreground settle or the sweeper.
pub struct TransactionMachine<S, G, N> {
    repo: Arc<S>,
    gateway: Arc<G>,
    notifier: Arc<N>,
    ids: Arc<IdProvider>,
    clock: Arc<dyn Clock>,
    pending_ttl: Duration,
}

impl<S, G, N> TransactionMachine<S, G, N>
where
    S: TransactionRepository,
    G: PaymentGateway,
    N: Notifier,
{
    /// Create a transaction machine
    pub fn new(
        repo: Arc<S>,
        gateway: Arc<G>,
        notifier: Arc<N>,
        ids: Arc<IdProvider>,
        clock: Arc<dyn Clock>,
        pending_ttl: Duration,
    ) -> Self {
        Self { repo, gateway, notifier, ids, clock, pending_ttl }
    }

    /// Open a pending transaction, or return the existing one if the
    /// idempotency key was already used (first write wins)
    pub async fn open(&self, input: OpenTransaction) -> EngineResult<TransactionRow> {
        let now = self.clock.now();

        // The store enforces transaction-id uniqueness; an id collision
        // (recovered counter behind a hand-inserted row) just means we draw
        // the next number.
        for _ in 0..3 {
            let create = CreateTransaction {
                transaction_id: self.ids.next_transaction_id(now),
                idempotency_key: input.idempotency_key.clone(),
                vehicle_id: input.vehicle_id.clone(),
                amount: input.amount,
                kind: input.kind,
                method: input.method,
                status: TransactionStatus::Pending,
                description: input.description.clone(),
                created_at: now,
                expires_at: now + self.pending_ttl,
            };

            match self.repo.insert_if_absent(create).await {
                Ok(row) => {
                    tracing::info!(
                        txn = %row.transaction_id,
                        kind = %row.kind,
                        amount = row.amount,
                        "transaction open"
                    );
                    return Ok(row);
                }
                Err(e) if e.is_duplicate() => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(EngineError::InvalidArgument(
            "could not allocate a unique transaction id".to_string(),
        ))
    }

    /// Look up a transaction
    pub async fn get(&self, id: &TransactionId) -> EngineResult<TransactionRow> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| EngineError::TransactionNotFound(id.clone()))
    }

    /// Look up a transaction by its idempotency key
    pub async fn get_by_key(&self, key: &IdempotencyKey) -> EngineResult<Option<TransactionRow>> {
        Ok(self.repo.find_by_idempotency_key(key).await?)
    }

    /// Settle a pending transaction: cash is approved directly, card and
    /// wallet charges go through the gateway. An expired pending row is
    /// marked failed and reported as such.
    pub async fn settle(&self, id: &TransactionId) -> EngineResult<TransactionRow> {
        let txn = self.get(id).await?;
        let now = self.clock.now();

        if txn.status.is_terminal() {
            return Err(EngineError::AlreadyTerminal {
                id: id.clone(),
                status: txn.status,
            });
        }

        if txn.expires_at <= now {
            // Losing this race to the sweeper is fine; either way the row
            // ends up failed-expired, and only the winner announces it.
            if self
                .repo
                .transition(id, TransactionStatus::Failed, Some(FailureReason::Expired), now)
                .await?
            {
                let row = self.get(id).await?;
                self.notifier.transaction_expired(&row).await;
            }
            return Err(EngineError::TransactionExpired(id.clone()));
        }

        let outcome = match txn.method {
            PaymentMethod::Cash => ChargeOutcome::Approved,
            PaymentMethod::Card | PaymentMethod::Wallet => self.gateway.charge(&txn).await?,
        };

        match outcome {
            ChargeOutcome::Approved => {
                if !self
                    .repo
                    .transition(id, TransactionStatus::Completed, None, now)
                    .await?
                {
                    // A sweeper or concurrent settle got there first.
                    let current = self.get(id).await?;
                    return Err(EngineError::AlreadyTerminal {
                        id: id.clone(),
                        status: current.status,
                    });
                }
                tracing::info!(txn = %id, "transaction completed");
                let row = self.get(id).await?;
                self.notifier.transaction_completed(&row).await;
                Ok(row)
            }
            ChargeOutcome::Declined(reason) => {
                self.repo
                    .transition(
                        id,
                        TransactionStatus::Failed,
                        Some(FailureReason::GatewayDeclined),
                        now,
                    )
                    .await?;
                tracing::warn!(txn = %id, %reason, "gateway declined charge");
                Err(EngineError::PaymentDeclined { id: id.clone(), reason })
            }
        }
    }

    /// Cancel a pending transaction on the operator's behalf
    pub async fn cancel(&self, id: &TransactionId) -> EngineResult<TransactionRow> {
        let txn = self.get(id).await?;
        if txn.status.is_terminal() {
            return Err(EngineError::AlreadyTerminal {
                id: id.clone(),
                status: txn.status,
            });
        }

        let now = self.clock.now();
        if !self
            .repo
            .transition(
                id,
                TransactionStatus::Failed,
                Some(FailureReason::OperatorCancelled),
                now,
            )
            .await?
        {
            let current = self.get(id).await?;
            return Err(EngineError::AlreadyTerminal {
                id: id.clone(),
                status: current.status,
            });
        }
        self.get(id).await
    }

    /// Refund a completed transaction
    ///
    /// The original row stays untouched; the refund is a separate completed
    /// record of kind `Refund` deduplicated on its own idempotency key.
    pub async fn refund(
        &self,
        original: &TransactionId,
        idempotency_key: IdempotencyKey,
    ) -> EngineResult<TransactionRow> {
        let txn = self.get(original).await?;
        if txn.status != TransactionStatus::Completed {
            return Err(EngineError::InvalidArgument(format!(
                "cannot refund a {} transaction",
                txn.status
            )));
        }

        let refund = self
            .open(OpenTransaction {
                idempotency_key,
                vehicle_id: txn.vehicle_id.clone(),
                amount: txn.amount,
                kind: TransactionKind::Refund,
                method: txn.method,
                description: format!("refund of {}", txn.transaction_id),
            })
            .await?;
        // A retried refund finds its earlier settled row under the same key.
        if refund.status == TransactionStatus::Completed {
            return Ok(refund);
        }
        self.settle(&refund.transaction_id).await
    }

    /// Expire one overdue pending row; `false` when already settled
    pub(crate) async fn expire_if_due(&self, txn: &TransactionRow) -> EngineResult<bool> {
        let now = self.clock.now();
        if txn.expires_at > now {
            return Ok(false);
        }
        let expired = self
            .repo
            .transition(
                &txn.transaction_id,
                TransactionStatus::Failed,
                Some(FailureReason::Expired),
                now,
            )
            .await?;
        if expired {
            let row = self.get(&txn.transaction_id).await?;
            self.notifier.transaction_expired(&row).await;
        }
        Ok(expired)
    }

    /// Pending rows past their expiry instant
    pub(crate) async fn list_expired_pending(&self) -> EngineResult<Vec<TransactionRow>> {
        Ok(self.repo.list_expired_pending(self.clock.now()).await?)
    }
}
