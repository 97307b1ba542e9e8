//! Shared storage error model.
//!
//! These are **infrastructure errors** (connectivity, lost races at the
//! storage layer, corrupt rows) as opposed to domain errors (validation,
//! invariants). The engine never masks an `Unavailable` as "no products
//! found" — storage trouble always surfaces to the caller.

use thiserror::Error;

/// Storage operation error, shared by the catalog store and the ledger.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or the operation did not complete.
    /// Retriable from the caller's perspective.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A storage-level conflict, e.g. the one-active-reservation-per-customer
    /// index rejected an insert.
    #[error("storage conflict: {0}")]
    Conflict(String),

    /// A stored row violates a domain invariant and cannot be loaded.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Map a sqlx error onto the store error model.
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db) = err {
        if db.is_unique_violation() {
            return StoreError::Conflict(format!("{operation}: {}", db.message()));
        }
    }
    StoreError::Unavailable(format!("{operation}: {err}"))
}
