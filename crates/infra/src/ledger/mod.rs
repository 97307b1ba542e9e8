//! Reservation ledger: one row per reservation, at most one *active* row per
//! customer.
//!
//! The engine enforces at-most-one-active-reservation-per-customer by
//! releasing before reserving; the ledger enforces it again at the storage
//! layer (`insert_active` conflicts) so that two racing `reserve` calls for
//! the same customer cannot both slip a row in.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryLedger;
pub use postgres::PostgresLedger;

use chrono::{DateTime, Utc};

use leadstock_core::CustomerId;
use leadstock_reservations::{Reservation, ReservationId};

use crate::store::StoreError;

/// Storage contract for reservation rows.
#[async_trait::async_trait]
pub trait ReservationLedger: Send + Sync {
    /// Persist a new active hold. Fails with [`StoreError::Conflict`] when an
    /// active row already exists for the customer.
    async fn insert_active(&self, reservation: &Reservation) -> Result<(), StoreError>;

    /// The customer's active hold, if any. Settled rows are not returned.
    async fn find_active_by_customer(
        &self,
        customer: CustomerId,
    ) -> Result<Option<Reservation>, StoreError>;

    /// Any row — active or settled — by its ID (audit/order-creation reads).
    async fn find_by_id(&self, id: ReservationId) -> Result<Option<Reservation>, StoreError>;

    /// Flip an active row to settled (`reserved_from` cleared, `sold_from`
    /// set). Returns `false` when the row is missing or not active.
    async fn settle(&self, id: ReservationId, sold_from: DateTime<Utc>)
    -> Result<bool, StoreError>;

    /// Compensating transition: flip a settled row back to an active hold
    /// with its original timestamp. Returns `false` when the row is missing
    /// or not settled.
    async fn reopen(
        &self,
        id: ReservationId,
        reserved_from: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Delete an active row. Returns whether a row was removed. Settled rows
    /// are kept as the audit trail and are not deleted here.
    async fn delete(&self, id: ReservationId) -> Result<bool, StoreError>;

    /// Delete active rows whose hold began before `cutoff`. Settled rows are
    /// never touched. Returns the number deleted.
    async fn delete_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}
