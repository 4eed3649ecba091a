//! Vehicle types

use serde::{Deserialize, Serialize};

/// Kind of vehicle the facility accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    /// Two-wheeler slot class
    Motorbike,
    /// Four-wheeler slot class
    Car,
}

impl VehicleType {
    /// Slot id prefix for this vehicle type (`M001`, `C001`)
    pub const fn slot_prefix(&self) -> &'static str {
        match self {
            Self::Motorbike => "M",
            Self::Car => "C",
        }
    }

    /// Vehicle id prefix for casual sessions
    pub const fn casual_prefix(&self) -> &'static str {
        match self {
            Self::Motorbike => "M",
            Self::Car => "C",
        }
    }

    /// Vehicle id prefix for monthly subscribers (`MM001`, `MC001`)
    pub const fn monthly_prefix(&self) -> &'static str {
        match self {
            Self::Motorbike => "MM",
            Self::Car => "MC",
        }
    }
}

impl std::fmt::Display for VehicleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Motorbike => write!(f, "motorbike"),
            Self::Car => write!(f, "car"),
        }
    }
}

impl std::str::FromStr for VehicleType {
    type Err = VehicleTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "motorbike" | "motorcycle" => Ok(Self::Motorbike),
            "car" => Ok(Self::Car),
            _ => Err(VehicleTypeParseError(s.to_string())),
        }
    }
}

/// Error parsing a vehicle type string
#[derive(Debug, Clone)]
pub struct VehicleTypeParseError(pub String);

impl std::fmt::Display for VehicleTypeParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid vehicle type: {}", self.0)
    }
}

impl std::error::Error for VehicleTypeParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_motorcycle_alias() {
        assert_eq!("motorcycle".parse::<VehicleType>().unwrap(), VehicleType::Motorbike);
        assert_eq!("CAR".parse::<VehicleType>().unwrap(), VehicleType::Car);
        assert!("bicycle".parse::<VehicleType>().is_err());
    }
}
