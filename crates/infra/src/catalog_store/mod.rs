//! Product catalog store: reservability queries and conditional availability
//! updates.
//!
//! The catalog is the contended resource. Every mutation is **conditional on
//! the product's current availability at the moment of the write** — that is
//! where the no-double-claim guarantee lives, not in any in-process lock.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryCatalog;
pub use postgres::PostgresCatalog;

use chrono::{DateTime, Utc};

use leadstock_catalog::{ProductFilter, ProductId};
use leadstock_core::CustomerId;

use crate::store::StoreError;

/// Storage contract for product availability.
///
/// ## Implementation requirements
///
/// - `claim_if_free` must re-check reservability per product inside the
///   update itself (conditioned `UPDATE`, or a re-check under the write
///   lock). Two concurrent claims for the same product must never both
///   succeed.
/// - `mark_sold` and `release_held_by` only touch products currently held by
///   the given customer.
/// - Candidate ordering from `find_reservable` is unspecified and randomized;
///   callers must not depend on it.
/// - No call may hold an in-process lock across I/O.
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    /// Up to `limit` product IDs that are reservable at `now` and match every
    /// supplied filter dimension.
    async fn find_reservable(
        &self,
        filter: &ProductFilter,
        limit: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<ProductId>, StoreError>;

    /// Conditionally place a hold on each listed product. Products that are
    /// no longer reservable are skipped, never overwritten. Returns the
    /// number actually claimed.
    async fn claim_if_free(
        &self,
        ids: &[ProductId],
        holder: CustomerId,
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    /// Clear every hold belonging to `holder`. Returns the number released.
    async fn release_held_by(&self, holder: CustomerId) -> Result<u64, StoreError>;

    /// Convert `holder`'s holds into ownership until `sold_until`. Returns
    /// the number of products transitioned.
    async fn mark_sold(
        &self,
        holder: CustomerId,
        sold_until: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    /// Clear expired holds and lapsed sold windows. Returns the number of
    /// products cleared. Safe to run concurrently with every other call.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}
