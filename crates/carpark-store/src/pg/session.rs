//! PostgreSQL session repository implementation

use async_trait::async_trait;
use carpark_types::{SlotId, VehicleId};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::StoreResult;
use crate::models::{CreateSession, SessionRow};
use crate::pg::{map_insert_err, parse_col};
use crate::repo::SessionRepository;

const SESSION_COLUMNS: &str = "vehicle_id, license_plate, vehicle_type, slot_id, entry_time, \
                               exit_time, status, monthly_subscriber";

#[derive(sqlx::FromRow)]
struct RawSessionRow {
    vehicle_id: String,
    license_plate: String,
    vehicle_type: String,
    slot_id: String,
    entry_time: DateTime<Utc>,
    exit_time: Option<DateTime<Utc>>,
    status: String,
    monthly_subscriber: bool,
}

impl TryFrom<RawSessionRow> for SessionRow {
    type Error = crate::StoreError;

    fn try_from(raw: RawSessionRow) -> Result<Self, Self::Error> {
        Ok(SessionRow {
            vehicle_id: VehicleId(raw.vehicle_id),
            license_plate: raw.license_plate,
            vehicle_type: parse_col("vehicle_type", &raw.vehicle_type)?,
            slot_id: SlotId(raw.slot_id),
            entry_time: raw.entry_time,
            exit_time: raw.exit_time,
            status: parse_col("status", &raw.status)?,
            monthly_subscriber: raw.monthly_subscriber,
        })
    }
}

/// PostgreSQL session repository
///
/// The at-most-one-`parking`-session-per-plate invariant is enforced by a
/// partial unique index:
///
/// ```sql
/// CREATE UNIQUE INDEX parking_sessions_active_plate
///     ON parking_sessions (license_plate) WHERE status = 'parking';
/// ```
#[derive(Clone)]
pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    /// Create a new session repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn insert(&self, session: CreateSession) -> StoreResult<SessionRow> {
        // A monthly vehicle re-enters under its registered id: the upsert
        // replaces an exited stay, while the guarded DO UPDATE leaves a
        // still-parking row untouched (no row returned -> duplicate).
        let raw = sqlx::query_as::<_, RawSessionRow>(&format!(
            r#"
            INSERT INTO parking_sessions (vehicle_id, license_plate, vehicle_type, slot_id,
                                          entry_time, status, monthly_subscriber)
            VALUES ($1, $2, $3, $4, $5, 'parking', $6)
            ON CONFLICT (vehicle_id) DO UPDATE
            SET license_plate = EXCLUDED.license_plate,
                vehicle_type = EXCLUDED.vehicle_type,
                slot_id = EXCLUDED.slot_id,
                entry_time = EXCLUDED.entry_time,
                exit_time = NULL,
                status = 'parking',
                monthly_subscriber = EXCLUDED.monthly_subscriber
            WHERE parking_sessions.status = 'exited'
            RETURNING {SESSION_COLUMNS}
            "#,
        ))
        .bind(session.vehicle_id.as_str())
        .bind(&session.license_plate)
        .bind(session.vehicle_type.to_string())
        .bind(session.slot_id.as_str())
        .bind(session.entry_time)
        .bind(session.monthly_subscriber)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_insert_err(e, "session", &session.license_plate))?;

        match raw {
            Some(raw) => raw.try_into(),
            None => Err(crate::StoreError::Duplicate {
                entity: "vehicle",
                key: session.vehicle_id.0,
            }),
        }
    }

    async fn find_by_vehicle_id(&self, vehicle_id: &VehicleId) -> StoreResult<Option<SessionRow>> {
        let raw = sqlx::query_as::<_, RawSessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM parking_sessions WHERE vehicle_id = $1"
        ))
        .bind(vehicle_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        raw.map(SessionRow::try_from).transpose()
    }

    async fn find_active_by_plate(&self, plate: &str) -> StoreResult<Option<SessionRow>> {
        let raw = sqlx::query_as::<_, RawSessionRow>(&format!(
            r#"
            SELECT {SESSION_COLUMNS} FROM parking_sessions
            WHERE license_plate = $1 AND status = 'parking'
            "#,
        ))
        .bind(plate)
        .fetch_optional(&self.pool)
        .await?;

        raw.map(SessionRow::try_from).transpose()
    }

    async fn close(&self, vehicle_id: &VehicleId, exit_time: DateTime<Utc>) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE parking_sessions
            SET status = 'exited', exit_time = $2
            WHERE vehicle_id = $1 AND status = 'parking'
            "#,
        )
        .bind(vehicle_id.as_str())
        .bind(exit_time)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_active(&self) -> StoreResult<Vec<SessionRow>> {
        let rows = sqlx::query_as::<_, RawSessionRow>(&format!(
            r#"
            SELECT {SESSION_COLUMNS} FROM parking_sessions
            WHERE status = 'parking'
            ORDER BY entry_time
            "#,
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SessionRow::try_from).collect()
    }

    async fn max_vehicle_seq(&self, prefix: &str) -> StoreResult<u64> {
        let max: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT MAX(CAST(SUBSTRING(vehicle_id FROM CHAR_LENGTH($1) + 1) AS BIGINT))
            FROM parking_sessions
            WHERE vehicle_id ~ ('^' || $1 || '[0-9]+$')
            "#,
        )
        .bind(prefix)
        .fetch_one(&self.pool)
        .await?;

        Ok(max.unwrap_or(0) as u64)
    }
}
