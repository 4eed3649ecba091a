//! PostgreSQL slot repository implementation

use async_trait::async_trait;
use carpark_types::{SlotId, SlotStatus, VehicleId, VehicleType};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::StoreResult;
use crate::models::{CreateSlot, SlotCount, SlotRow};
use crate::pg::{map_insert_err, parse_col};
use crate::repo::SlotRepository;

const SLOT_COLUMNS: &str =
    "slot_id, slot_type, status, current_vehicle_id, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct RawSlotRow {
    slot_id: String,
    slot_type: String,
    status: String,
    current_vehicle_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RawSlotRow> for SlotRow {
    type Error = crate::StoreError;

    fn try_from(raw: RawSlotRow) -> Result<Self, Self::Error> {
        Ok(SlotRow {
            slot_id: SlotId(raw.slot_id),
            slot_type: parse_col("slot_type", &raw.slot_type)?,
            status: parse_col("status", &raw.status)?,
            current_vehicle_id: raw.current_vehicle_id.map(VehicleId),
            created_at: raw.created_at,
            updated_at: raw.updated_at,
        })
    }
}

/// PostgreSQL slot repository
#[derive(Clone)]
pub struct PgSlotRepository {
    pool: PgPool,
}

impl PgSlotRepository {
    /// Create a new slot repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SlotRepository for PgSlotRepository {
    async fn insert_slots(&self, slots: Vec<CreateSlot>) -> StoreResult<()> {
        for slot in slots {
            sqlx::query(
                r#"
                INSERT INTO parking_slots (slot_id, slot_type, status)
                VALUES ($1, $2, 'available')
                "#,
            )
            .bind(slot.slot_id.as_str())
            .bind(slot.slot_type.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| map_insert_err(e, "slot", slot.slot_id.as_str()))?;
        }
        Ok(())
    }

    async fn find_by_id(&self, slot_id: &SlotId) -> StoreResult<Option<SlotRow>> {
        let raw = sqlx::query_as::<_, RawSlotRow>(&format!(
            "SELECT {SLOT_COLUMNS} FROM parking_slots WHERE slot_id = $1"
        ))
        .bind(slot_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        raw.map(SlotRow::try_from).transpose()
    }

    async fn count_slots(&self) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM parking_slots")
            .fetch_one(&self.pool)
            .await?;

        Ok(count as u64)
    }

    async fn claim_first_available(
        &self,
        slot_type: VehicleType,
        vehicle_id: &VehicleId,
    ) -> StoreResult<Option<SlotRow>> {
        // SKIP LOCKED keeps concurrent claimants from queueing on the same
        // row; each one locks the lowest free slot it can still see.
        let raw = sqlx::query_as::<_, RawSlotRow>(&format!(
            r#"
            UPDATE parking_slots
            SET status = 'occupied', current_vehicle_id = $2, updated_at = NOW()
            WHERE slot_id = (
                SELECT slot_id FROM parking_slots
                WHERE slot_type = $1 AND status = 'available'
                ORDER BY slot_id
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {SLOT_COLUMNS}
            "#,
        ))
        .bind(slot_type.to_string())
        .bind(vehicle_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        raw.map(SlotRow::try_from).transpose()
    }

    async fn occupy_reserved(
        &self,
        slot_id: &SlotId,
        vehicle_id: &VehicleId,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE parking_slots
            SET status = 'occupied', current_vehicle_id = $2, updated_at = NOW()
            WHERE slot_id = $1 AND status = 'reserved'
            "#,
        )
        .bind(slot_id.as_str())
        .bind(vehicle_id.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn release(&self, slot_id: &SlotId, to: SlotStatus) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE parking_slots
            SET status = $2, current_vehicle_id = NULL, updated_at = NOW()
            WHERE slot_id = $1 AND status = 'occupied'
            "#,
        )
        .bind(slot_id.as_str())
        .bind(to.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn reserve_if_available(&self, slot_id: &SlotId) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE parking_slots
            SET status = 'reserved', updated_at = NOW()
            WHERE slot_id = $1 AND status = 'available'
            "#,
        )
        .bind(slot_id.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn reserve_first_available(
        &self,
        slot_type: VehicleType,
    ) -> StoreResult<Option<SlotRow>> {
        let raw = sqlx::query_as::<_, RawSlotRow>(&format!(
            r#"
            UPDATE parking_slots
            SET status = 'reserved', updated_at = NOW()
            WHERE slot_id = (
                SELECT slot_id FROM parking_slots
                WHERE slot_type = $1 AND status = 'available'
                ORDER BY slot_id
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {SLOT_COLUMNS}
            "#,
        ))
        .bind(slot_type.to_string())
        .fetch_optional(&self.pool)
        .await?;

        raw.map(SlotRow::try_from).transpose()
    }

    async fn free_reserved(&self, slot_id: &SlotId) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE parking_slots
            SET status = 'available', updated_at = NOW()
            WHERE slot_id = $1 AND status = 'reserved'
            "#,
        )
        .bind(slot_id.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_by_type_and_status(&self) -> StoreResult<Vec<SlotCount>> {
        let rows: Vec<(String, String, i64)> = sqlx::query_as(
            r#"
            SELECT slot_type, status, COUNT(*)
            FROM parking_slots
            GROUP BY slot_type, status
            ORDER BY slot_type, status
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(slot_type, status, count)| {
                Ok(SlotCount {
                    slot_type: parse_col("slot_type", &slot_type)?,
                    status: parse_col("status", &status)?,
                    count: count as u64,
                })
            })
            .collect()
    }
}
