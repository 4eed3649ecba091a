//! Engine errors

use carpark_store::StoreError;
use carpark_types::{SlotId, TransactionId, TransactionStatus, VehicleId, VehicleType};
use thiserror::Error;

/// Parking engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// No free slot of the requested type
    #[error("no {vehicle_type} slot available")]
    CapacityExceeded {
        /// The full vehicle type
        vehicle_type: VehicleType,
    },

    /// The plate is already inside the facility
    #[error("plate {license_plate} is already parking as {existing}")]
    DuplicateActiveSession {
        /// The offending plate
        license_plate: String,
        /// Vehicle id of the open session
        existing: VehicleId,
    },

    /// The plate already holds a valid monthly package
    #[error("plate {0} already has a valid subscription")]
    SubscriptionExists(String),

    /// No session for the given vehicle id
    #[error("session not found: {0}")]
    SessionNotFound(VehicleId),

    /// The session has already been checked out
    #[error("session already closed: {0}")]
    SessionClosed(VehicleId),

    /// No subscription for the given vehicle id
    #[error("subscription not found: {0}")]
    SubscriptionNotFound(VehicleId),

    /// The subscription was cancelled and cannot be used or renewed
    #[error("subscription cancelled: {0}")]
    SubscriptionCancelled(VehicleId),

    /// A fixed slot was not in the expected state
    #[error("slot not available: {0}")]
    SlotNotAvailable(SlotId),

    /// No transaction with the given id
    #[error("transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// The transaction already reached a terminal state
    #[error("transaction {id} is already {status}")]
    AlreadyTerminal {
        /// The transaction
        id: TransactionId,
        /// Its terminal status
        status: TransactionStatus,
    },

    /// The pending window elapsed before settlement
    #[error("transaction expired: {0}")]
    TransactionExpired(TransactionId),

    /// The payment gateway declined the charge
    #[error("payment declined for {id}: {reason}")]
    PaymentDeclined {
        /// The failed transaction
        id: TransactionId,
        /// Gateway-supplied reason
        reason: String,
    },

    /// A caller-supplied value was rejected
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Persistence failure
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl EngineError {
    /// Whether the error means "no such record"
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::SessionNotFound(_)
                | Self::SubscriptionNotFound(_)
                | Self::TransactionNotFound(_)
        )
    }

    /// Whether the error is a state conflict the caller should not retry
    /// verbatim (duplicate, terminal, or closed records)
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::DuplicateActiveSession { .. }
                | Self::SubscriptionExists(_)
                | Self::SessionClosed(_)
                | Self::AlreadyTerminal { .. }
        )
    }

    /// Error code for API responses and logs
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            Self::DuplicateActiveSession { .. } => "DUPLICATE_ACTIVE_SESSION",
            Self::SubscriptionExists(_) => "SUBSCRIPTION_EXISTS",
            Self::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Self::SessionClosed(_) => "SESSION_CLOSED",
            Self::SubscriptionNotFound(_) => "SUBSCRIPTION_NOT_FOUND",
            Self::SubscriptionCancelled(_) => "SUBSCRIPTION_CANCELLED",
            Self::SlotNotAvailable(_) => "SLOT_NOT_AVAILABLE",
            Self::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            Self::AlreadyTerminal { .. } => "TRANSACTION_TERMINAL",
            Self::TransactionExpired(_) => "TRANSACTION_EXPIRED",
            Self::PaymentDeclined { .. } => "PAYMENT_DECLINED",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }
}

/// Convenience alias for engine results
pub type EngineResult<T> = Result<T, EngineError>;
