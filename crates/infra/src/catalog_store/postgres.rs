//! Postgres-backed product catalog store.
//!
//! Expected schema:
//!
//! ```sql
//! CREATE TABLE products (
//!     product_id     UUID PRIMARY KEY,
//!     company_name   TEXT NOT NULL,
//!     org_number     TEXT NOT NULL,
//!     address        TEXT NOT NULL DEFAULT '',
//!     city           TEXT NOT NULL,
//!     postal_code    TEXT NOT NULL,
//!     business_type  TEXT NOT NULL,
//!     revenue        BIGINT NOT NULL,
//!     employees      INT NOT NULL,
//!     holder_id      UUID,
//!     reserved_until TIMESTAMPTZ,
//!     sold_until     TIMESTAMPTZ
//! );
//! ```
//!
//! Claims are single conditional `UPDATE` statements: the reservability check
//! sits inside the `WHERE` clause, so concurrent claims on the same row
//! serialize on the row lock and the loser simply affects zero rows. No
//! in-process lock is held across any query.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use leadstock_catalog::{ProductFilter, ProductId};
use leadstock_core::{CustomerId, EntityId};

use super::CatalogStore;
use crate::store::{StoreError, map_sqlx_error};

pub struct PostgresCatalog {
    pool: Arc<PgPool>,
}

impl PostgresCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

/// Non-empty set as an array bind, or `None` to disable the clause.
fn array_param(values: impl IntoIterator<Item = String>) -> Option<Vec<String>> {
    let collected: Vec<String> = values.into_iter().collect();
    if collected.is_empty() { None } else { Some(collected) }
}

#[async_trait::async_trait]
impl CatalogStore for PostgresCatalog {
    async fn find_reservable(
        &self,
        filter: &ProductFilter,
        limit: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<ProductId>, StoreError> {
        let business_types = array_param(filter.business_type_prefixes());
        let cities = array_param(filter.cities.iter().cloned());
        let postal_codes = array_param(filter.postal_codes.iter().cloned());
        let min_revenue = filter.min_revenue;
        let min_employees = filter.min_employees.map(|v| v as i32);

        let rows = sqlx::query(
            r#"
            SELECT product_id
            FROM products
            WHERE (reserved_until IS NULL OR reserved_until < $1)
                AND (sold_until IS NULL OR sold_until < $1)
                AND ($2::text[] IS NULL OR split_part(business_type, '.', 1) = ANY($2))
                AND ($3::text[] IS NULL OR city = ANY($3))
                AND ($4::text[] IS NULL OR postal_code = ANY($4))
                AND ($5::bigint IS NULL OR revenue >= $5)
                AND ($6::int IS NULL OR employees >= $6)
            ORDER BY random()
            LIMIT $7
            "#,
        )
        .bind(now)
        .bind(business_types)
        .bind(cities)
        .bind(postal_codes)
        .bind(min_revenue)
        .bind(min_employees)
        .bind(i64::from(limit))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_reservable", e))?;

        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            let uuid: Uuid = row
                .try_get("product_id")
                .map_err(|e| StoreError::Corrupt(format!("product_id column: {e}")))?;
            ids.push(ProductId::new(EntityId::from_uuid(uuid)));
        }
        Ok(ids)
    }

    async fn claim_if_free(
        &self,
        ids: &[ProductId],
        holder: CustomerId,
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let id_params: Vec<Uuid> = ids.iter().map(|id| *id.0.as_uuid()).collect();

        let result = sqlx::query(
            r#"
            UPDATE products
            SET holder_id = $1, reserved_until = $2, sold_until = NULL
            WHERE product_id = ANY($3)
                AND (reserved_until IS NULL OR reserved_until < $4)
                AND (sold_until IS NULL OR sold_until < $4)
            "#,
        )
        .bind(*holder.as_uuid())
        .bind(until)
        .bind(&id_params)
        .bind(now)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("claim_if_free", e))?;

        Ok(result.rows_affected())
    }

    async fn release_held_by(&self, holder: CustomerId) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET holder_id = NULL, reserved_until = NULL
            WHERE holder_id = $1 AND reserved_until IS NOT NULL
            "#,
        )
        .bind(*holder.as_uuid())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("release_held_by", e))?;

        Ok(result.rows_affected())
    }

    async fn mark_sold(
        &self,
        holder: CustomerId,
        sold_until: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET reserved_until = NULL, sold_until = $2
            WHERE holder_id = $1 AND reserved_until IS NOT NULL
            "#,
        )
        .bind(*holder.as_uuid())
        .bind(sold_until)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("mark_sold", e))?;

        Ok(result.rows_affected())
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("sweep_expired", e))?;

        let holds = sqlx::query(
            r#"
            UPDATE products
            SET holder_id = NULL, reserved_until = NULL
            WHERE reserved_until < $1
            "#,
        )
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("sweep_expired", e))?;

        // Lapsed sold windows re-enter the pool too.
        let sales = sqlx::query(
            r#"
            UPDATE products
            SET holder_id = NULL, sold_until = NULL
            WHERE sold_until < $1
            "#,
        )
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("sweep_expired", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("sweep_expired", e))?;

        Ok(holds.rows_affected() + sales.rows_affected())
    }
}
