//! Payment gateway and notification abstractions

use async_trait::async_trait;
use carpark_store::{SubscriptionRow, TransactionRow};

use crate::error::EngineResult;

/// Gateway verdict for a charge attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeOutcome {
    /// The charge went through
    Approved,
    /// The gateway refused the charge
    Declined(String),
}

/// Payment gateway trait
///
/// Abstracts the card/wallet processor. Cash settlements never reach the
/// gateway; the transaction machine approves them directly.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Attempt to charge a pending transaction
    async fn charge(&self, transaction: &TransactionRow) -> EngineResult<ChargeOutcome>;
}

/// Gateway that approves everything, for cash-only deployments and tests
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproveAllGateway;

#[async_trait]
impl PaymentGateway for ApproveAllGateway {
    async fn charge(&self, _transaction: &TransactionRow) -> EngineResult<ChargeOutcome> {
        Ok(ChargeOutcome::Approved)
    }
}

/// Outbound customer notifications
///
/// Implementations deliver on a best-effort basis; the sweeper logs and
/// carries on if delivery fails.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// A payment settled; the invoice/receipt side can fan out from here
    async fn transaction_completed(&self, transaction: &TransactionRow);

    /// A pending payment expired before it was settled
    async fn transaction_expired(&self, transaction: &TransactionRow);

    /// The subscription ends within the warning window
    async fn expiry_warning(&self, subscription: &SubscriptionRow, days_left: i64);

    /// The subscription has lapsed
    async fn subscription_expired(&self, subscription: &SubscriptionRow);
}

/// Notifier that drops every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn transaction_completed(&self, _transaction: &TransactionRow) {}

    async fn transaction_expired(&self, _transaction: &TransactionRow) {}

    async fn expiry_warning(&self, _subscription: &SubscriptionRow, _days_left: i64) {}

    async fn subscription_expired(&self, _subscription: &SubscriptionRow) {}
}
