//! Engine configuration

use carpark_types::{Amount, DiscountTier, VehicleType};
use chrono::Duration;

use crate::error::{EngineError, EngineResult};

/// Pricing for casual stays and monthly packages
#[derive(Debug, Clone)]
pub struct FeeSchedule {
    /// Flat per-stay fee for a casual car
    pub casual_car: Amount,
    /// Flat per-stay fee for a casual motorbike
    pub casual_motorbike: Amount,
    /// Monthly base price for a car package
    pub monthly_car: Amount,
    /// Monthly base price for a motorbike package
    pub monthly_motorbike: Amount,
    /// Duration-based discount tiers, sorted by `min_months`
    pub discount_tiers: Vec<DiscountTier>,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            casual_car: 30_000,
            casual_motorbike: 10_000,
            monthly_car: 500_000,
            monthly_motorbike: 100_000,
            discount_tiers: vec![
                DiscountTier { min_months: 1, max_months: Some(2), discount_percentage: 0 },
                DiscountTier { min_months: 3, max_months: Some(5), discount_percentage: 10 },
                DiscountTier { min_months: 6, max_months: Some(11), discount_percentage: 20 },
                DiscountTier { min_months: 12, max_months: None, discount_percentage: 40 },
            ],
        }
    }
}

impl FeeSchedule {
    /// Flat fee for one casual stay
    pub fn casual_fee(&self, vehicle_type: VehicleType) -> Amount {
        match vehicle_type {
            VehicleType::Car => self.casual_car,
            VehicleType::Motorbike => self.casual_motorbike,
        }
    }

    /// Monthly base price before discounts
    pub fn monthly_base(&self, vehicle_type: VehicleType) -> Amount {
        match vehicle_type {
            VehicleType::Car => self.monthly_car,
            VehicleType::Motorbike => self.monthly_motorbike,
        }
    }

    /// Discount percentage for a package duration
    pub fn discount_for(&self, months: u32) -> u32 {
        self.discount_tiers
            .iter()
            .find(|t| t.contains(months))
            .map(|t| t.discount_percentage)
            .unwrap_or(0)
    }

    /// Check tiers are sane: positive prices, percentages under 100, and
    /// tiers sorted, gap-free, and non-overlapping from one month up
    pub fn validate(&self) -> EngineResult<()> {
        if self.casual_car <= 0
            || self.casual_motorbike <= 0
            || self.monthly_car <= 0
            || self.monthly_motorbike <= 0
        {
            return Err(EngineError::InvalidArgument(
                "fees must be positive".to_string(),
            ));
        }

        if self.discount_tiers.is_empty() {
            return Err(EngineError::InvalidArgument(
                "at least one discount tier is required".to_string(),
            ));
        }

        let mut expected_min = 1;
        for (i, tier) in self.discount_tiers.iter().enumerate() {
            if tier.discount_percentage >= 100 {
                return Err(EngineError::InvalidArgument(format!(
                    "tier {i}: discount must be below 100%"
                )));
            }
            if tier.min_months != expected_min {
                return Err(EngineError::InvalidArgument(format!(
                    "tier {i}: expected to start at {expected_min} months, starts at {}",
                    tier.min_months
                )));
            }
            match tier.max_months {
                Some(max) if max < tier.min_months => {
                    return Err(EngineError::InvalidArgument(format!(
                        "tier {i}: max below min"
                    )));
                }
                Some(max) => expected_min = max + 1,
                // Open-ended tier must be the last one
                None if i + 1 != self.discount_tiers.len() => {
                    return Err(EngineError::InvalidArgument(format!(
                        "tier {i}: open-ended tier must be last"
                    )));
                }
                None => {}
            }
        }

        Ok(())
    }
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Pricing tables
    pub fees: FeeSchedule,
    /// How long a pending transaction stays payable
    pub pending_ttl: Duration,
    /// How often the sweeper expires stale pending transactions
    pub transaction_sweep_interval: Duration,
    /// How often the sweeper retires lapsed subscriptions
    pub subscription_sweep_interval: Duration,
    /// How far ahead expiry warnings look
    pub expiry_warning_window: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fees: FeeSchedule::default(),
            pending_ttl: Duration::minutes(30),
            transaction_sweep_interval: Duration::minutes(5),
            subscription_sweep_interval: Duration::hours(1),
            expiry_warning_window: Duration::days(3),
        }
    }
}

impl EngineConfig {
    /// Set the pricing tables
    pub fn with_fees(mut self, fees: FeeSchedule) -> Self {
        self.fees = fees;
        self
    }

    /// Set the pending-transaction time to live
    pub fn with_pending_ttl(mut self, ttl: Duration) -> Self {
        self.pending_ttl = ttl;
        self
    }

    /// Set the expiry warning lookahead
    pub fn with_expiry_warning_window(mut self, window: Duration) -> Self {
        self.expiry_warning_window = window;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> EngineResult<()> {
        if self.pending_ttl <= Duration::zero() {
            return Err(EngineError::InvalidArgument(
                "pending_ttl must be positive".to_string(),
            ));
        }
        self.fees.validate()
    }
}
