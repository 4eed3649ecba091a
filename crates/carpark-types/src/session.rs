//! Vehicle session types

use serde::{Deserialize, Serialize};

use crate::StatusParseError;

/// Status of a vehicle session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Vehicle is inside the facility
    Parking,
    /// Session closed, vehicle has left
    Exited,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parking => write!(f, "parking"),
            Self::Exited => write!(f, "exited"),
        }
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "parking" => Ok(Self::Parking),
            "exited" => Ok(Self::Exited),
            _ => Err(StatusParseError("session status", s.to_string())),
        }
    }
}
