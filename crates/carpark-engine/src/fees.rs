//! Fee calculation

use carpark_types::{Amount, SubscriptionQuote, VehicleType};

use crate::config::FeeSchedule;
use crate::error::{EngineError, EngineResult};

/// Computes casual fees and monthly package quotes from a [`FeeSchedule`]
#[derive(Debug, Clone)]
pub struct FeeCalculator {
    schedule: FeeSchedule,
}

impl FeeCalculator {
    /// Create a calculator over a validated schedule
    pub fn new(schedule: FeeSchedule) -> Self {
        Self { schedule }
    }

    /// Flat fee for one casual stay, independent of duration
    pub fn casual_fee(&self, vehicle_type: VehicleType) -> Amount {
        self.schedule.casual_fee(vehicle_type)
    }

    /// Price a monthly package of `months` duration
    pub fn quote(&self, vehicle_type: VehicleType, months: u32) -> EngineResult<SubscriptionQuote> {
        if months == 0 {
            return Err(EngineError::InvalidArgument(
                "package must be at least one month".to_string(),
            ));
        }

        let base_price = self.schedule.monthly_base(vehicle_type);
        let total_before_discount = base_price * Amount::from(months);
        let discount_percentage = self.schedule.discount_for(months);
        let final_amount =
            total_before_discount * Amount::from(100 - discount_percentage) / 100;

        Ok(SubscriptionQuote {
            base_price,
            months,
            total_before_discount,
            discount_percentage,
            final_amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carpark_types::DiscountTier;

    fn calculator() -> FeeCalculator {
        FeeCalculator::new(FeeSchedule::default())
    }

    #[test]
    fn test_casual_fee_is_flat() {
        let calc = calculator();
        assert_eq!(calc.casual_fee(VehicleType::Car), 30_000);
        assert_eq!(calc.casual_fee(VehicleType::Motorbike), 10_000);
    }

    #[test]
    fn test_quote_applies_tier_discount() {
        let calc = calculator();

        // 3 months of car parking lands in the 10% tier.
        let quote = calc.quote(VehicleType::Car, 3).unwrap();
        assert_eq!(quote.total_before_discount, 1_500_000);
        assert_eq!(quote.discount_percentage, 10);
        assert_eq!(quote.final_amount, 1_350_000);

        // A year gets the deepest discount.
        let quote = calc.quote(VehicleType::Motorbike, 12).unwrap();
        assert_eq!(quote.total_before_discount, 1_200_000);
        assert_eq!(quote.final_amount, 720_000);
    }

    #[test]
    fn test_quote_worked_example() {
        // 300,000 x 3 months at 10% off = 810,000.
        let calc = FeeCalculator::new(FeeSchedule {
            monthly_car: 300_000,
            ..FeeSchedule::default()
        });
        let quote = calc.quote(VehicleType::Car, 3).unwrap();
        assert_eq!(quote.final_amount, 810_000);
    }

    #[test]
    fn test_quote_rejects_zero_months() {
        let calc = calculator();
        assert!(matches!(
            calc.quote(VehicleType::Car, 0),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_quote_without_matching_tier_has_no_discount() {
        // A schedule covering only 1..=2 months leaves longer packages
        // undiscounted rather than failing.
        let calc = FeeCalculator::new(FeeSchedule {
            discount_tiers: vec![DiscountTier {
                min_months: 1,
                max_months: Some(2),
                discount_percentage: 0,
            }],
            ..FeeSchedule::default()
        });
        let quote = calc.quote(VehicleType::Car, 7).unwrap();
        assert_eq!(quote.discount_percentage, 0);
        assert_eq!(quote.final_amount, quote.total_before_discount);
    }
}
