use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use leadstock_core::CustomerId;
use leadstock_reservations::{Reservation, ReservationId};

use super::ReservationLedger;
use crate::store::StoreError;

/// In-memory reservation ledger. Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    rows: RwLock<HashMap<ReservationId, Reservation>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows, settled ones included.
    pub fn len(&self) -> usize {
        self.rows.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<ReservationId, Reservation>>, StoreError>
    {
        self.rows
            .read()
            .map_err(|_| StoreError::Unavailable("ledger lock poisoned".to_string()))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<ReservationId, Reservation>>, StoreError>
    {
        self.rows
            .write()
            .map_err(|_| StoreError::Unavailable("ledger lock poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl ReservationLedger for InMemoryLedger {
    async fn insert_active(&self, reservation: &Reservation) -> Result<(), StoreError> {
        let mut guard = self.write()?;
        let customer = reservation.customer_id();
        if guard
            .values()
            .any(|r| r.customer_id() == customer && r.is_active())
        {
            return Err(StoreError::Conflict(format!(
                "customer {customer} already has an active reservation"
            )));
        }
        guard.insert(reservation.id(), reservation.clone());
        Ok(())
    }

    async fn find_active_by_customer(
        &self,
        customer: CustomerId,
    ) -> Result<Option<Reservation>, StoreError> {
        let guard = self.read()?;
        Ok(guard
            .values()
            .find(|r| r.customer_id() == customer && r.is_active())
            .cloned())
    }

    async fn find_by_id(&self, id: ReservationId) -> Result<Option<Reservation>, StoreError> {
        Ok(self.read()?.get(&id).cloned())
    }

    async fn settle(
        &self,
        id: ReservationId,
        sold_from: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut guard = self.write()?;
        match guard.get_mut(&id) {
            Some(row) => Ok(row.settle(sold_from).is_ok()),
            None => Ok(false),
        }
    }

    async fn reopen(
        &self,
        id: ReservationId,
        reserved_from: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut guard = self.write()?;
        match guard.get_mut(&id) {
            Some(row) => Ok(row.reopen(reserved_from).is_ok()),
            None => Ok(false),
        }
    }

    async fn delete(&self, id: ReservationId) -> Result<bool, StoreError> {
        let mut guard = self.write()?;
        let is_active = guard.get(&id).is_some_and(Reservation::is_active);
        if is_active {
            guard.remove(&id);
        }
        Ok(is_active)
    }

    async fn delete_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut guard = self.write()?;
        let before = guard.len();
        guard.retain(|_, row| !(row.is_active() && row.reserved_from().is_some_and(|t| t < cutoff)));
        Ok((before - guard.len()) as u64)
    }
}
