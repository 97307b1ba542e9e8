//! Postgres-backed reservation ledger.
//!
//! Expected schema:
//!
//! ```sql
//! CREATE TABLE reservations (
//!     reservation_id   UUID PRIMARY KEY,
//!     customer_id      UUID NOT NULL,
//!     business_types   TEXT,
//!     regions          TEXT,
//!     cities_by_region TEXT,
//!     cities           TEXT,
//!     postal_codes     TEXT,
//!     min_revenue      BIGINT,
//!     max_revenue      BIGINT,
//!     min_employees    INT,
//!     max_employees    INT,
//!     quantity         INT NOT NULL,
//!     reserved_from    TIMESTAMPTZ,
//!     sold_from        TIMESTAMPTZ
//! );
//!
//! -- Storage-level backstop for at-most-one-active-reservation-per-customer.
//! CREATE UNIQUE INDEX reservations_one_active_per_customer
//!     ON reservations (customer_id)
//!     WHERE reserved_from IS NOT NULL;
//! ```
//!
//! The filter sets are persisted comma-joined — purely a storage format; the
//! domain model works with proper string sets.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use leadstock_catalog::ProductFilter;
use leadstock_core::{CustomerId, EntityId};
use leadstock_reservations::{Reservation, ReservationId};

use super::ReservationLedger;
use crate::store::{StoreError, map_sqlx_error};

pub struct PostgresLedger {
    pool: Arc<PgPool>,
}

impl PostgresLedger {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

fn join_set(values: &BTreeSet<String>) -> Option<String> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().cloned().collect::<Vec<_>>().join(","))
    }
}

fn split_set(value: Option<String>) -> BTreeSet<String> {
    value
        .map(|joined| {
            joined
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn reservation_from_row(row: &PgRow) -> Result<Reservation, StoreError> {
    let corrupt = |e: sqlx::Error| StoreError::Corrupt(format!("reservation row: {e}"));

    let reservation_id: Uuid = row.try_get("reservation_id").map_err(corrupt)?;
    let customer_id: Uuid = row.try_get("customer_id").map_err(corrupt)?;
    let quantity: i32 = row.try_get("quantity").map_err(corrupt)?;
    let reserved_from: Option<DateTime<Utc>> = row.try_get("reserved_from").map_err(corrupt)?;
    let sold_from: Option<DateTime<Utc>> = row.try_get("sold_from").map_err(corrupt)?;

    let filters = ProductFilter {
        business_types: split_set(row.try_get("business_types").map_err(corrupt)?),
        regions: split_set(row.try_get("regions").map_err(corrupt)?),
        cities_by_region: split_set(row.try_get("cities_by_region").map_err(corrupt)?),
        cities: split_set(row.try_get("cities").map_err(corrupt)?),
        postal_codes: split_set(row.try_get("postal_codes").map_err(corrupt)?),
        min_revenue: row.try_get("min_revenue").map_err(corrupt)?,
        max_revenue: row.try_get("max_revenue").map_err(corrupt)?,
        min_employees: row
            .try_get::<Option<i32>, _>("min_employees")
            .map_err(corrupt)?
            .map(|v| v as u32),
        max_employees: row
            .try_get::<Option<i32>, _>("max_employees")
            .map_err(corrupt)?
            .map(|v| v as u32),
    };

    Reservation::from_parts(
        ReservationId::new(EntityId::from_uuid(reservation_id)),
        CustomerId::from_uuid(customer_id),
        filters,
        quantity as u32,
        reserved_from,
        sold_from,
    )
    .map_err(|e| StoreError::Corrupt(e.to_string()))
}

const SELECT_COLUMNS: &str = r#"
    SELECT
        reservation_id,
        customer_id,
        business_types,
        regions,
        cities_by_region,
        cities,
        postal_codes,
        min_revenue,
        max_revenue,
        min_employees,
        max_employees,
        quantity,
        reserved_from,
        sold_from
    FROM reservations
"#;

#[async_trait::async_trait]
impl ReservationLedger for PostgresLedger {
    async fn insert_active(&self, reservation: &Reservation) -> Result<(), StoreError> {
        let filters = reservation.filters();
        sqlx::query(
            r#"
            INSERT INTO reservations (
                reservation_id,
                customer_id,
                business_types,
                regions,
                cities_by_region,
                cities,
                postal_codes,
                min_revenue,
                max_revenue,
                min_employees,
                max_employees,
                quantity,
                reserved_from,
                sold_from
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, NULL)
            "#,
        )
        .bind(*reservation.id().0.as_uuid())
        .bind(*reservation.customer_id().as_uuid())
        .bind(join_set(&filters.business_types))
        .bind(join_set(&filters.regions))
        .bind(join_set(&filters.cities_by_region))
        .bind(join_set(&filters.cities))
        .bind(join_set(&filters.postal_codes))
        .bind(filters.min_revenue)
        .bind(filters.max_revenue)
        .bind(filters.min_employees.map(|v| v as i32))
        .bind(filters.max_employees.map(|v| v as i32))
        .bind(reservation.quantity() as i32)
        .bind(reservation.reserved_from())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_active", e))?;

        Ok(())
    }

    async fn find_active_by_customer(
        &self,
        customer: CustomerId,
    ) -> Result<Option<Reservation>, StoreError> {
        let sql = format!("{SELECT_COLUMNS} WHERE customer_id = $1 AND reserved_from IS NOT NULL");
        let row = sqlx::query(&sql)
            .bind(*customer.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_active_by_customer", e))?;

        row.as_ref().map(reservation_from_row).transpose()
    }

    async fn find_by_id(&self, id: ReservationId) -> Result<Option<Reservation>, StoreError> {
        let sql = format!("{SELECT_COLUMNS} WHERE reservation_id = $1");
        let row = sqlx::query(&sql)
            .bind(*id.0.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_by_id", e))?;

        row.as_ref().map(reservation_from_row).transpose()
    }

    async fn settle(
        &self,
        id: ReservationId,
        sold_from: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE reservations
            SET reserved_from = NULL, sold_from = $2
            WHERE reservation_id = $1 AND reserved_from IS NOT NULL
            "#,
        )
        .bind(*id.0.as_uuid())
        .bind(sold_from)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("settle", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn reopen(
        &self,
        id: ReservationId,
        reserved_from: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE reservations
            SET reserved_from = $2, sold_from = NULL
            WHERE reservation_id = $1 AND sold_from IS NOT NULL
            "#,
        )
        .bind(*id.0.as_uuid())
        .bind(reserved_from)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("reopen", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: ReservationId) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM reservations
            WHERE reservation_id = $1 AND reserved_from IS NOT NULL
            "#,
        )
        .bind(*id.0.as_uuid())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("delete", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM reservations
            WHERE reserved_from IS NOT NULL AND reserved_from < $1
            "#,
        )
        .bind(cutoff)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("delete_expired", e))?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_and_split_round_trip() {
        let set: BTreeSet<String> = ["A1.2", "B7", "C3"].iter().map(|s| s.to_string()).collect();
        assert_eq!(join_set(&set).as_deref(), Some("A1.2,B7,C3"));
        assert_eq!(split_set(join_set(&set)), set);
    }

    #[test]
    fn empty_set_persists_as_null() {
        assert_eq!(join_set(&BTreeSet::new()), None);
        assert!(split_set(None).is_empty());
    }

    #[test]
    fn split_discards_blank_segments() {
        let parsed = split_set(Some("A1, ,B2,".to_string()));
        let expected: BTreeSet<String> = ["A1", "B2"].iter().map(|s| s.to_string()).collect();
        assert_eq!(parsed, expected);
    }
}
