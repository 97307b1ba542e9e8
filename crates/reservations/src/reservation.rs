use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use leadstock_catalog::ProductFilter;
use leadstock_core::{CustomerId, DomainError, DomainResult, Entity, EntityId};

/// Reservation identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReservationId(pub EntityId);

impl ReservationId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ReservationId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// One customer's batch of held (or bought) products.
///
/// The filter snapshot records what was searched for, for audit and display;
/// it is never re-evaluated. `quantity` is the count actually claimed, which
/// may be lower than what the customer asked for when inventory ran short.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    id: ReservationId,
    customer_id: CustomerId,
    filters: ProductFilter,
    quantity: u32,
    reserved_from: Option<DateTime<Utc>>,
    sold_from: Option<DateTime<Utc>>,
}

impl Reservation {
    /// Create a new active hold.
    pub fn hold(
        id: ReservationId,
        customer_id: CustomerId,
        filters: ProductFilter,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            customer_id,
            filters,
            quantity,
            reserved_from: Some(now),
            sold_from: None,
        }
    }

    /// Rebuild a reservation from stored columns, enforcing the
    /// exactly-one-of-{`reserved_from`, `sold_from`} invariant.
    pub fn from_parts(
        id: ReservationId,
        customer_id: CustomerId,
        filters: ProductFilter,
        quantity: u32,
        reserved_from: Option<DateTime<Utc>>,
        sold_from: Option<DateTime<Utc>>,
    ) -> DomainResult<Self> {
        match (reserved_from, sold_from) {
            (Some(_), Some(_)) => Err(DomainError::invariant(
                "reservation cannot be both an active hold and a settled sale",
            )),
            (None, None) => Err(DomainError::invariant(
                "reservation must be either an active hold or a settled sale",
            )),
            _ => Ok(Self {
                id,
                customer_id,
                filters,
                quantity,
                reserved_from,
                sold_from,
            }),
        }
    }

    pub fn id(&self) -> ReservationId {
        self.id
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn filters(&self) -> &ProductFilter {
        &self.filters
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn reserved_from(&self) -> Option<DateTime<Utc>> {
        self.reserved_from
    }

    pub fn sold_from(&self) -> Option<DateTime<Utc>> {
        self.sold_from
    }

    /// An active hold; settled sales are not "active".
    pub fn is_active(&self) -> bool {
        self.reserved_from.is_some()
    }

    pub fn is_settled(&self) -> bool {
        self.sold_from.is_some()
    }

    /// When the hold lapses, given the engine's window. `None` once settled.
    pub fn expires_at(&self, window: Duration) -> Option<DateTime<Utc>> {
        self.reserved_from.map(|from| from + window)
    }

    pub fn is_expired(&self, window: Duration, now: DateTime<Utc>) -> bool {
        self.expires_at(window).is_some_and(|t| t <= now)
    }

    /// Convert the active hold into a settled sale.
    pub fn settle(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.is_active() {
            return Err(DomainError::invariant("only an active hold can settle"));
        }
        self.reserved_from = None;
        self.sold_from = Some(now);
        Ok(())
    }

    /// Compensating transition: revert a settled sale back to an active hold
    /// carrying its original timestamp. Used when the catalog side of a
    /// settlement fails after the ledger row already flipped.
    pub fn reopen(&mut self, reserved_from: DateTime<Utc>) -> DomainResult<()> {
        if !self.is_settled() {
            return Err(DomainError::invariant("only a settled sale can reopen"));
        }
        self.sold_from = None;
        self.reserved_from = Some(reserved_from);
        Ok(())
    }
}

impl Entity for Reservation {
    type Id = ReservationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active() -> Reservation {
        Reservation::hold(
            ReservationId::new(EntityId::new()),
            CustomerId::new(),
            ProductFilter::default(),
            5,
            Utc::now(),
        )
    }

    #[test]
    fn new_hold_is_active_not_settled() {
        let r = active();
        assert!(r.is_active());
        assert!(!r.is_settled());
        assert!(r.reserved_from().is_some());
        assert!(r.sold_from().is_none());
    }

    #[test]
    fn settle_flips_exactly_one_timestamp() {
        let mut r = active();
        let now = Utc::now();
        r.settle(now).unwrap();

        assert!(!r.is_active());
        assert!(r.is_settled());
        assert!(r.reserved_from().is_none());
        assert_eq!(r.sold_from(), Some(now));

        // Settling twice violates the invariant.
        assert!(r.settle(now).is_err());
    }

    #[test]
    fn reopen_restores_the_original_hold_timestamp() {
        let mut r = active();
        let held_from = r.reserved_from().unwrap();
        r.settle(Utc::now()).unwrap();
        r.reopen(held_from).unwrap();

        assert!(r.is_active());
        assert_eq!(r.reserved_from(), Some(held_from));

        // Reopening an active hold is an error.
        assert!(r.reopen(held_from).is_err());
    }

    #[test]
    fn from_parts_rejects_impossible_states() {
        let id = ReservationId::new(EntityId::new());
        let customer = CustomerId::new();
        let now = Utc::now();

        assert!(
            Reservation::from_parts(id, customer, ProductFilter::default(), 1, Some(now), Some(now))
                .is_err()
        );
        assert!(
            Reservation::from_parts(id, customer, ProductFilter::default(), 1, None, None).is_err()
        );
        assert!(
            Reservation::from_parts(id, customer, ProductFilter::default(), 1, Some(now), None)
                .is_ok()
        );
    }

    #[test]
    fn expiry_is_window_relative() {
        let r = active();
        let window = Duration::minutes(15);
        let held_from = r.reserved_from().unwrap();

        assert_eq!(r.expires_at(window), Some(held_from + window));
        assert!(!r.is_expired(window, held_from + Duration::minutes(14)));
        assert!(r.is_expired(window, held_from + Duration::minutes(16)));
    }
}
