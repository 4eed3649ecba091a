//! PostgreSQL subscription repository implementation

use async_trait::async_trait;
use carpark_types::{CustomerInfo, SlotId, SubscriptionStatus, VehicleId};
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use crate::error::StoreResult;
use crate::models::{CreateSubscription, SubscriptionRow};
use crate::pg::{map_insert_err, parse_col};
use crate::repo::{ApplyRenewal, SubscriptionRepository};

const SUB_COLUMNS: &str = "vehicle_id, license_plate, vehicle_type, customer_name, \
                           customer_phone, customer_email, start_date, end_date, \
                           package_months, package_amount, discount_percentage, status, \
                           fixed_slot_id, registered_at, last_renewal_at";

#[derive(sqlx::FromRow)]
struct RawSubscriptionRow {
    vehicle_id: String,
    license_plate: String,
    vehicle_type: String,
    customer_name: String,
    customer_phone: String,
    customer_email: String,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    package_months: i32,
    package_amount: i64,
    discount_percentage: i32,
    status: String,
    fixed_slot_id: Option<String>,
    registered_at: DateTime<Utc>,
    last_renewal_at: Option<DateTime<Utc>>,
}

impl TryFrom<RawSubscriptionRow> for SubscriptionRow {
    type Error = crate::StoreError;

    fn try_from(raw: RawSubscriptionRow) -> Result<Self, Self::Error> {
        Ok(SubscriptionRow {
            vehicle_id: VehicleId(raw.vehicle_id),
            license_plate: raw.license_plate,
            vehicle_type: parse_col("vehicle_type", &raw.vehicle_type)?,
            customer: CustomerInfo {
                name: raw.customer_name,
                phone: raw.customer_phone,
                email: raw.customer_email,
            },
            start_date: raw.start_date,
            end_date: raw.end_date,
            package_months: raw.package_months as u32,
            package_amount: raw.package_amount,
            discount_percentage: raw.discount_percentage as u32,
            status: parse_col("status", &raw.status)?,
            fixed_slot_id: raw.fixed_slot_id.map(SlotId),
            registered_at: raw.registered_at,
            last_renewal_at: raw.last_renewal_at,
        })
    }
}

/// PostgreSQL subscription repository
///
/// The at-most-one-`valid`-package-per-plate invariant is enforced by a
/// partial unique index:
///
/// ```sql
/// CREATE UNIQUE INDEX monthly_subscriptions_valid_plate
///     ON monthly_subscriptions (license_plate) WHERE status = 'valid';
/// ```
#[derive(Clone)]
pub struct PgSubscriptionRepository {
    pool: PgPool,
}

impl PgSubscriptionRepository {
    /// Create a new subscription repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionRepository for PgSubscriptionRepository {
    async fn insert(&self, sub: CreateSubscription) -> StoreResult<SubscriptionRow> {
        let raw = sqlx::query_as::<_, RawSubscriptionRow>(&format!(
            r#"
            INSERT INTO monthly_subscriptions (vehicle_id, license_plate, vehicle_type,
                                               customer_name, customer_phone, customer_email,
                                               start_date, end_date, package_months,
                                               package_amount, discount_percentage, status,
                                               fixed_slot_id, registered_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'valid', $12, $7)
            RETURNING {SUB_COLUMNS}
            "#,
        ))
        .bind(sub.vehicle_id.as_str())
        .bind(&sub.license_plate)
        .bind(sub.vehicle_type.to_string())
        .bind(&sub.customer.name)
        .bind(&sub.customer.phone)
        .bind(&sub.customer.email)
        .bind(sub.start_date)
        .bind(sub.end_date)
        .bind(sub.package_months as i32)
        .bind(sub.package_amount)
        .bind(sub.discount_percentage as i32)
        .bind(sub.fixed_slot_id.as_ref().map(|s| s.as_str().to_string()))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_insert_err(e, "subscription", &sub.license_plate))?;

        raw.try_into()
    }

    async fn find_by_vehicle_id(
        &self,
        vehicle_id: &VehicleId,
    ) -> StoreResult<Option<SubscriptionRow>> {
        let raw = sqlx::query_as::<_, RawSubscriptionRow>(&format!(
            "SELECT {SUB_COLUMNS} FROM monthly_subscriptions WHERE vehicle_id = $1"
        ))
        .bind(vehicle_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        raw.map(SubscriptionRow::try_from).transpose()
    }

    async fn find_valid_by_plate(&self, plate: &str) -> StoreResult<Option<SubscriptionRow>> {
        let raw = sqlx::query_as::<_, RawSubscriptionRow>(&format!(
            r#"
            SELECT {SUB_COLUMNS} FROM monthly_subscriptions
            WHERE license_plate = $1 AND status = 'valid'
            "#,
        ))
        .bind(plate)
        .fetch_optional(&self.pool)
        .await?;

        raw.map(SubscriptionRow::try_from).transpose()
    }

    async fn renew(&self, renewal: ApplyRenewal) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE monthly_subscriptions
            SET end_date = $2, package_months = $3, package_amount = $4,
                discount_percentage = $5, status = 'valid',
                fixed_slot_id = COALESCE($6, fixed_slot_id),
                last_renewal_at = $7
            WHERE vehicle_id = $1
            "#,
        )
        .bind(renewal.vehicle_id.as_str())
        .bind(renewal.new_end_date)
        .bind(renewal.package_months as i32)
        .bind(renewal.package_amount)
        .bind(renewal.discount_percentage as i32)
        .bind(renewal.fixed_slot_id.as_ref().map(|s| s.as_str().to_string()))
        .bind(renewal.renewed_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_status(
        &self,
        vehicle_id: &VehicleId,
        status: SubscriptionStatus,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE monthly_subscriptions SET status = $2 WHERE vehicle_id = $1",
        )
        .bind(vehicle_id.as_str())
        .bind(status.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn expire_if_due(&self, vehicle_id: &VehicleId, now: DateTime<Utc>) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE monthly_subscriptions
            SET status = 'expired'
            WHERE vehicle_id = $1 AND status = 'valid' AND end_date <= $2
            "#,
        )
        .bind(vehicle_id.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_expired_valid(&self, now: DateTime<Utc>) -> StoreResult<Vec<SubscriptionRow>> {
        let rows = sqlx::query_as::<_, RawSubscriptionRow>(&format!(
            r#"
            SELECT {SUB_COLUMNS} FROM monthly_subscriptions
            WHERE status = 'valid' AND end_date <= $1
            ORDER BY end_date
            "#,
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SubscriptionRow::try_from).collect()
    }

    async fn list_expiring(
        &self,
        now: DateTime<Utc>,
        window: Duration,
    ) -> StoreResult<Vec<SubscriptionRow>> {
        let rows = sqlx::query_as::<_, RawSubscriptionRow>(&format!(
            r#"
            SELECT {SUB_COLUMNS} FROM monthly_subscriptions
            WHERE status = 'valid' AND end_date > $1 AND end_date <= $2
            ORDER BY end_date
            "#,
        ))
        .bind(now)
        .bind(now + window)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SubscriptionRow::try_from).collect()
    }

    async fn max_vehicle_seq(&self, prefix: &str) -> StoreResult<u64> {
        let max: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT MAX(CAST(SUBSTRING(vehicle_id FROM CHAR_LENGTH($1) + 1) AS BIGINT))
            FROM monthly_subscriptions
            WHERE vehicle_id ~ ('^' || $1 || '[0-9]+$')
            "#,
        )
        .bind(prefix)
        .fetch_one(&self.pool)
        .await?;

        Ok(max.unwrap_or(0) as u64)
    }
}
