//! Payment transaction types

use serde::{Deserialize, Serialize};

use crate::StatusParseError;

/// Payment method used to settle a transaction
///
/// The engine drives every method through the same state machine; the
/// gateway-specific protocol lives with the external payment collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Settled at the booth by an operator
    Cash,
    /// E-wallet payment
    Wallet,
    /// Card payment
    Card,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cash => write!(f, "cash"),
            Self::Wallet => write!(f, "wallet"),
            Self::Card => write!(f, "card"),
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cash" => Ok(Self::Cash),
            "wallet" => Ok(Self::Wallet),
            "card" => Ok(Self::Card),
            _ => Err(StatusParseError("payment method", s.to_string())),
        }
    }
}

/// What a transaction pays for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Casual per-session parking fee
    ParkingFee,
    /// New monthly subscription package
    MonthlySubscription,
    /// Renewal of an existing monthly package
    MonthlyRenewal,
    /// Operator-initiated compensating record for a completed transaction
    Refund,
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ParkingFee => write!(f, "parking_fee"),
            Self::MonthlySubscription => write!(f, "monthly_subscription"),
            Self::MonthlyRenewal => write!(f, "monthly_renewal"),
            Self::Refund => write!(f, "refund"),
        }
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "parking_fee" => Ok(Self::ParkingFee),
            "monthly_subscription" => Ok(Self::MonthlySubscription),
            "monthly_renewal" => Ok(Self::MonthlyRenewal),
            "refund" => Ok(Self::Refund),
            _ => Err(StatusParseError("transaction kind", s.to_string())),
        }
    }
}

/// Status of a payment transaction
///
/// `Completed` and `Failed` are terminal; no transition leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Awaiting gateway confirmation, expires at the record's TTL
    Pending,
    /// Settled exactly once
    Completed,
    /// Declined, abandoned, or expired
    Failed,
}

impl TransactionStatus {
    /// Whether this status admits no further transitions
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(StatusParseError("transaction status", s.to_string())),
        }
    }
}

/// Why a transaction reached `Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// TTL elapsed while still pending
    Expired,
    /// Gateway reported a declined payment
    GatewayDeclined,
    /// Operator cancelled the attempt
    OperatorCancelled,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Expired => write!(f, "expired"),
            Self::GatewayDeclined => write!(f, "gateway_declined"),
            Self::OperatorCancelled => write!(f, "operator_cancelled"),
        }
    }
}

impl std::str::FromStr for FailureReason {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "expired" => Ok(Self::Expired),
            "gateway_declined" => Ok(Self::GatewayDeclined),
            "operator_cancelled" => Ok(Self::OperatorCancelled),
            _ => Err(StatusParseError("failure reason", s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(TransactionStatus::Completed.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Completed,
            TransactionStatus::Failed,
        ] {
            assert_eq!(status.to_string().parse::<TransactionStatus>().unwrap(), status);
        }
    }
}
