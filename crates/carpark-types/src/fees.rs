//! Fee and quote types
//!
//! Amounts are whole VND as `i64`; the facility never bills fractional dong.

use serde::{Deserialize, Serialize};

/// Monetary amount in VND
pub type Amount = i64;

/// One discount tier for monthly packages
///
/// Tiers cover disjoint, contiguous month ranges; the topmost tier is
/// open-ended (`max_months = None`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountTier {
    /// Inclusive lower bound in months
    pub min_months: u32,
    /// Inclusive upper bound in months; `None` means unbounded
    pub max_months: Option<u32>,
    /// Percentage off the undiscounted total
    pub discount_percentage: u32,
}

impl DiscountTier {
    /// Whether `months` falls inside this tier's range
    pub fn contains(&self, months: u32) -> bool {
        months >= self.min_months && self.max_months.map_or(true, |max| months <= max)
    }
}

/// Priced monthly package quote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionQuote {
    /// Per-month base price for the vehicle type
    pub base_price: Amount,
    /// Package length in months
    pub months: u32,
    /// `base_price * months` before any discount
    pub total_before_discount: Amount,
    /// Discount applied, from the matching tier
    pub discount_percentage: u32,
    /// Amount actually charged
    pub final_amount: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_contains() {
        let tier = DiscountTier { min_months: 3, max_months: Some(5), discount_percentage: 10 };
        assert!(!tier.contains(2));
        assert!(tier.contains(3));
        assert!(tier.contains(5));
        assert!(!tier.contains(6));

        let open = DiscountTier { min_months: 12, max_months: None, discount_percentage: 40 };
        assert!(open.contains(12));
        assert!(open.contains(240));
    }
}
