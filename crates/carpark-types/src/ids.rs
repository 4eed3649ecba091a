//! Identifier types
//!
//! All identifiers are human-readable facility codes (`C003`, `MM012`,
//! `TRX20250101...`), not surrogate keys. Each newtype is the natural key of
//! its entity and carries the uniqueness invariant the engine depends on.

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// View the id as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id! {
    /// Unique parking slot identifier (`M001`, `C042`)
    ///
    /// Slot ids sort lexicographically in allocation order, which is what
    /// makes lowest-slot-first claiming deterministic.
    SlotId
}

string_id! {
    /// Unique vehicle identifier (`C001` casual, `MC001`/`MM001` monthly)
    VehicleId
}

string_id! {
    /// Unique payment transaction identifier
    TransactionId
}

string_id! {
    /// Caller-supplied idempotency token for payment requests
    ///
    /// A retried request with the same key returns the original transaction
    /// instead of creating a second charge.
    IdempotencyKey
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_id_ordering_is_lexicographic() {
        let a = SlotId::from("C001");
        let b = SlotId::from("C002");
        let c = SlotId::from("C010");
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_display_roundtrip() {
        let id = VehicleId::from("MM007");
        assert_eq!(id.to_string(), "MM007");
        assert_eq!(id.as_str(), "MM007");
    }
}
