//! Parking slot types

use serde::{Deserialize, Serialize};

/// Status of a physical parking slot
///
/// Invariant: a slot references a vehicle iff it is `Occupied`. `Reserved`
/// marks a slot fixed-assigned to an active monthly subscriber while the
/// vehicle is away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    /// Free for any claim
    Available,
    /// A vehicle is parked in the slot
    Occupied,
    /// Held for a specific monthly subscriber
    Reserved,
}

impl std::fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available => write!(f, "available"),
            Self::Occupied => write!(f, "occupied"),
            Self::Reserved => write!(f, "reserved"),
        }
    }
}

impl std::str::FromStr for SlotStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "available" => Ok(Self::Available),
            "occupied" => Ok(Self::Occupied),
            "reserved" => Ok(Self::Reserved),
            _ => Err(StatusParseError("slot status", s.to_string())),
        }
    }
}

/// Error parsing a status string
#[derive(Debug, Clone)]
pub struct StatusParseError(pub &'static str, pub String);

impl std::fmt::Display for StatusParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {}: {}", self.0, self.1)
    }
}

impl std::error::Error for StatusParseError {}
