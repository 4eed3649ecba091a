//! Property-based tests for the fee calculator
//!
//! These pin down the pricing invariants:
//! - a discount never raises the price and never makes it negative
//! - the quote arithmetic is internally consistent
//! - longer packages never get a smaller discount (default schedule)

use carpark_engine::{FeeCalculator, FeeSchedule};
use carpark_types::VehicleType;
use proptest::prelude::*;

fn arb_vehicle_type() -> impl Strategy<Value = VehicleType> {
    prop_oneof![Just(VehicleType::Motorbike), Just(VehicleType::Car)]
}

proptest! {
    /// Property: the discounted price never exceeds the undiscounted total
    /// and never goes negative
    #[test]
    fn prop_discount_never_raises_price(
        vehicle_type in arb_vehicle_type(),
        months in 1u32..=120,
    ) {
        let calc = FeeCalculator::new(FeeSchedule::default());
        let quote = calc.quote(vehicle_type, months).unwrap();
        prop_assert!(quote.final_amount <= quote.total_before_discount);
        prop_assert!(quote.final_amount >= 0);
    }

    /// Property: the quote fields agree with each other
    #[test]
    fn prop_quote_arithmetic_is_consistent(
        vehicle_type in arb_vehicle_type(),
        months in 1u32..=120,
    ) {
        let calc = FeeCalculator::new(FeeSchedule::default());
        let quote = calc.quote(vehicle_type, months).unwrap();

        prop_assert_eq!(quote.months, months);
        prop_assert_eq!(
            quote.total_before_discount,
            quote.base_price * i64::from(months)
        );
        prop_assert_eq!(
            quote.final_amount,
            quote.total_before_discount * i64::from(100 - quote.discount_percentage) / 100
        );
        prop_assert!(quote.discount_percentage < 100);
    }

    /// Property: under the default tiers a longer package never earns a
    /// smaller discount
    #[test]
    fn prop_discount_is_monotonic_in_months(
        vehicle_type in arb_vehicle_type(),
        months in 1u32..=119,
    ) {
        let calc = FeeCalculator::new(FeeSchedule::default());
        let shorter = calc.quote(vehicle_type, months).unwrap();
        let longer = calc.quote(vehicle_type, months + 1).unwrap();
        prop_assert!(longer.discount_percentage >= shorter.discount_percentage);
    }

    /// Property: the undiscounted total grows linearly with duration
    #[test]
    fn prop_undiscounted_total_grows_with_duration(
        vehicle_type in arb_vehicle_type(),
        months in 1u32..=119,
    ) {
        let calc = FeeCalculator::new(FeeSchedule::default());
        let shorter = calc.quote(vehicle_type, months).unwrap();
        let longer = calc.quote(vehicle_type, months + 1).unwrap();
        prop_assert!(longer.total_before_discount > shorter.total_before_discount);
    }

    /// Property: the casual fee is flat, whatever the stay looked like
    #[test]
    fn prop_casual_fee_is_flat(vehicle_type in arb_vehicle_type()) {
        let calc = FeeCalculator::new(FeeSchedule::default());
        let expected = match vehicle_type {
            VehicleType::Car => 30_000,
            VehicleType::Motorbike => 10_000,
        };
        prop_assert_eq!(calc.casual_fee(vehicle_type), expected);
    }
}
