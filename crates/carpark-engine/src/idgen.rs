//! Identifier generation
//!
//! Vehicle ids are `<prefix><seq>` with a zero-padded three-digit sequence
//! (`C001`, `MM012`); the counters are per-prefix atomics seeded from the
//! store's high-water mark at startup. Allocation never reuses a number, so
//! two concurrent check-ins cannot mint the same id. The insert itself is
//! still the uniqueness authority: a duplicate-key error from the store makes
//! the caller draw the next number and retry.

use carpark_types::{TransactionId, VehicleId};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic id source for vehicles and transactions
#[derive(Debug, Default)]
pub struct IdProvider {
    vehicle_seq: DashMap<String, AtomicU64>,
    transaction_seq: AtomicU64,
}

impl IdProvider {
    /// Create an unseeded provider (all sequences start at 1)
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise a prefix's sequence floor to `high_water`
    pub fn seed(&self, prefix: &str, high_water: u64) {
        self.vehicle_seq
            .entry(prefix.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_max(high_water, Ordering::Relaxed);
    }

    /// Draw the next vehicle id for a prefix
    pub fn next_vehicle_id(&self, prefix: &str) -> VehicleId {
        let seq = self
            .vehicle_seq
            .entry(prefix.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed)
            + 1;
        VehicleId(format!("{prefix}{seq:03}"))
    }

    /// Draw the next transaction id
    pub fn next_transaction_id(&self, now: DateTime<Utc>) -> TransactionId {
        let seq = self.transaction_seq.fetch_add(1, Ordering::Relaxed) + 1;
        TransactionId(format!("TRX{}{seq:06}", now.format("%Y%m%d%H%M%S")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_sequences_are_per_prefix() {
        let ids = IdProvider::new();
        assert_eq!(ids.next_vehicle_id("C").as_str(), "C001");
        assert_eq!(ids.next_vehicle_id("C").as_str(), "C002");
        assert_eq!(ids.next_vehicle_id("MM").as_str(), "MM001");
        assert_eq!(ids.next_vehicle_id("C").as_str(), "C003");
    }

    #[test]
    fn test_seed_raises_floor_without_lowering() {
        let ids = IdProvider::new();
        ids.seed("C", 41);
        assert_eq!(ids.next_vehicle_id("C").as_str(), "C042");

        // Seeding below the current value is a no-op.
        ids.seed("C", 5);
        assert_eq!(ids.next_vehicle_id("C").as_str(), "C043");
    }

    #[test]
    fn test_wide_sequences_keep_growing() {
        let ids = IdProvider::new();
        ids.seed("M", 999);
        assert_eq!(ids.next_vehicle_id("M").as_str(), "M1000");
    }

    #[test]
    fn test_concurrent_draws_are_unique() {
        let ids = Arc::new(IdProvider::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let ids = Arc::clone(&ids);
            handles.push(std::thread::spawn(move || {
                (0..100)
                    .map(|_| ids.next_vehicle_id("C"))
                    .collect::<Vec<_>>()
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "vehicle id issued twice");
            }
        }
        assert_eq!(seen.len(), 800);
    }
}
