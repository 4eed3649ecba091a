//! Slot inventory

use carpark_store::{CreateSlot, SlotCount, SlotRepository, SlotRow};
use carpark_types::{SlotId, SlotStatus, VehicleId, VehicleType};
use std::sync::Arc;

use crate::error::{EngineError, EngineResult};

/// Slot inventory over a [`SlotRepository`]
///
/// Allocation policy is lowest-id-first; the repository's conditional updates
/// make claims and releases race-safe, so the registry never reads a status
/// and writes it back.
pub struct SlotRegistry<S: SlotRepository> {
    repo: Arc<S>,
}

impl<S: SlotRepository> Clone for SlotRegistry<S> {
    fn clone(&self) -> Self {
        Self { repo: Arc::clone(&self.repo) }
    }
}

impl<S: SlotRepository> SlotRegistry<S> {
    /// Create a registry over a slot repository
    pub fn new(repo: Arc<S>) -> Self {
        Self { repo }
    }

    /// Provision the facility: `M001..` motorbike slots and `C001..` car
    /// slots. Refuses to run twice.
    pub async fn provision(&self, motorbike_slots: u32, car_slots: u32) -> EngineResult<()> {
        if motorbike_slots == 0 && car_slots == 0 {
            return Err(EngineError::InvalidArgument(
                "facility must have at least one slot".to_string(),
            ));
        }
        if self.repo.count_slots().await? > 0 {
            return Err(EngineError::InvalidArgument(
                "slots are already provisioned".to_string(),
            ));
        }

        let mut slots = Vec::with_capacity((motorbike_slots + car_slots) as usize);
        for i in 1..=motorbike_slots {
            slots.push(CreateSlot {
                slot_id: SlotId(format!("M{i:03}")),
                slot_type: VehicleType::Motorbike,
            });
        }
        for i in 1..=car_slots {
            slots.push(CreateSlot {
                slot_id: SlotId(format!("C{i:03}")),
                slot_type: VehicleType::Car,
            });
        }

        self.repo.insert_slots(slots).await?;
        tracing::info!(motorbike_slots, car_slots, "provisioned parking slots");
        Ok(())
    }

    /// Look up one slot
    pub async fn get(&self, slot_id: &SlotId) -> EngineResult<Option<SlotRow>> {
        Ok(self.repo.find_by_id(slot_id).await?)
    }

    /// Occupancy counts grouped by (type, status)
    pub async fn occupancy(&self) -> EngineResult<Vec<SlotCount>> {
        Ok(self.repo.count_by_type_and_status().await?)
    }

    /// Claim the lowest free slot of a type for a vehicle
    pub async fn claim(
        &self,
        slot_type: VehicleType,
        vehicle_id: &VehicleId,
    ) -> EngineResult<SlotRow> {
        self.repo
            .claim_first_available(slot_type, vehicle_id)
            .await?
            .ok_or(EngineError::CapacityExceeded { vehicle_type: slot_type })
    }

    /// Re-occupy a monthly vehicle's reserved fixed slot
    pub async fn occupy_reserved(
        &self,
        slot_id: &SlotId,
        vehicle_id: &VehicleId,
    ) -> EngineResult<()> {
        if self.repo.occupy_reserved(slot_id, vehicle_id).await? {
            Ok(())
        } else {
            Err(EngineError::SlotNotAvailable(slot_id.clone()))
        }
    }

    /// Release an occupied slot back to `Available` (casual exit) or
    /// `Reserved` (monthly exit). A no-op if the slot was already released.
    pub async fn release(&self, slot_id: &SlotId, to: SlotStatus) -> EngineResult<()> {
        if !self.repo.release(slot_id, to).await? {
            tracing::debug!(slot = %slot_id, "release skipped: slot not occupied");
        }
        Ok(())
    }

    /// Reserve the lowest free slot of a type as a monthly fixed slot
    pub async fn reserve(&self, slot_type: VehicleType) -> EngineResult<SlotRow> {
        self.repo
            .reserve_first_available(slot_type)
            .await?
            .ok_or(EngineError::CapacityExceeded { vehicle_type: slot_type })
    }

    /// Free a reserved fixed slot when its subscription ends. Returns
    /// whether the slot was freed; an occupied slot stays put until the
    /// vehicle exits.
    pub async fn free_reserved(&self, slot_id: &SlotId) -> EngineResult<bool> {
        Ok(self.repo.free_reserved(slot_id).await?)
    }
}
