//! Monthly subscription types

use serde::{Deserialize, Serialize};

use crate::StatusParseError;

/// Status of a monthly subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Paid up, end date in the future
    Valid,
    /// End date passed without renewal
    Expired,
    /// Soft-cancelled by the customer; the record is never deleted
    Cancelled,
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Valid => write!(f, "valid"),
            Self::Expired => write!(f, "expired"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "valid" => Ok(Self::Valid),
            "expired" => Ok(Self::Expired),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(StatusParseError("subscription status", s.to_string())),
        }
    }
}

/// Customer contact details attached to a subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    /// Customer name
    pub name: String,
    /// Contact phone number
    pub phone: String,
    /// Contact email for expiry notifications
    pub email: String,
}
