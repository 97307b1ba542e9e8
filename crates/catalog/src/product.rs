use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use leadstock_core::{CustomerId, Entity, EntityId};

/// Product identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub EntityId);

impl ProductId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Mutable availability state of a product.
///
/// Transitions are conditional on the current state so that concurrent
/// callers cannot both succeed: `claim` only takes a product that is
/// reservable at the moment of the call, `mark_sold` only touches a product
/// that is currently held. Storage backends express the same conditions in
/// their update statements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    holder: Option<CustomerId>,
    reserved_until: Option<DateTime<Utc>>,
    sold_until: Option<DateTime<Utc>>,
}

impl Availability {
    /// Rebuild availability from stored columns. Row-mapping only.
    pub fn from_parts(
        holder: Option<CustomerId>,
        reserved_until: Option<DateTime<Utc>>,
        sold_until: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            holder,
            reserved_until,
            sold_until,
        }
    }

    pub fn holder(&self) -> Option<CustomerId> {
        self.holder
    }

    pub fn reserved_until(&self) -> Option<DateTime<Utc>> {
        self.reserved_until
    }

    pub fn sold_until(&self) -> Option<DateTime<Utc>> {
        self.sold_until
    }

    /// Whether an unexpired hold exists.
    pub fn hold_active(&self, now: DateTime<Utc>) -> bool {
        self.reserved_until.is_some_and(|t| t >= now)
    }

    /// Whether an unexpired sold window exists.
    pub fn sale_active(&self, now: DateTime<Utc>) -> bool {
        self.sold_until.is_some_and(|t| t >= now)
    }

    /// A product is reservable when it carries neither an active hold nor an
    /// unexpired sold window. Expired state counts as free even before the
    /// sweep has cleared it, so a claim can never lose to a stale hold.
    pub fn is_reservable(&self, now: DateTime<Utc>) -> bool {
        !self.hold_active(now) && !self.sale_active(now)
    }

    /// Conditionally take a hold. Returns `false` (and changes nothing) when
    /// the product is not reservable at `now`.
    pub fn claim(&mut self, holder: CustomerId, until: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        if !self.is_reservable(now) {
            return false;
        }
        self.holder = Some(holder);
        self.reserved_until = Some(until);
        self.sold_until = None;
        true
    }

    /// Drop the hold, if any. Returns whether anything changed.
    pub fn release(&mut self) -> bool {
        if self.reserved_until.is_none() {
            return false;
        }
        self.holder = None;
        self.reserved_until = None;
        true
    }

    /// Convert a hold into ownership: the holder is retained, the hold is
    /// cleared and the product stays off the market until `sold_until`.
    /// Returns `false` when no hold exists.
    pub fn mark_sold(&mut self, sold_until: DateTime<Utc>) -> bool {
        if self.reserved_until.is_none() {
            return false;
        }
        self.reserved_until = None;
        self.sold_until = Some(sold_until);
        true
    }

    /// Clear expired holds and lapsed sold windows. Returns whether anything
    /// was cleared. Active state within its window is never touched.
    pub fn clear_expired(&mut self, now: DateTime<Utc>) -> bool {
        let mut cleared = false;
        if let Some(t) = self.reserved_until {
            if t < now {
                self.holder = None;
                self.reserved_until = None;
                cleared = true;
            }
        }
        if let Some(t) = self.sold_until {
            if t < now {
                self.holder = None;
                self.sold_until = None;
                cleared = true;
            }
        }
        cleared
    }
}

/// A product record: one company lead.
///
/// Descriptive attributes come from the catalog import and are read-only
/// here; only `availability` is mutated by the reservation flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub company_name: String,
    pub org_number: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    /// Business category code, e.g. `"A1.2"`. Filtering matches on the
    /// prefix before the first `.`.
    pub business_type: String,
    /// Annual revenue in whole currency units.
    pub revenue: i64,
    pub employees: u32,
    pub availability: Availability,
}

impl Product {
    pub fn is_reservable(&self, now: DateTime<Utc>) -> bool {
        self.availability.is_reservable(now)
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn customer() -> CustomerId {
        CustomerId::new()
    }

    fn free() -> Availability {
        Availability::default()
    }

    #[test]
    fn fresh_product_is_reservable() {
        assert!(free().is_reservable(Utc::now()));
    }

    #[test]
    fn claim_takes_hold_once() {
        let now = Utc::now();
        let until = now + Duration::minutes(15);
        let mut avail = free();

        assert!(avail.claim(customer(), until, now));
        assert!(!avail.is_reservable(now));

        // Second claim while the first hold is active must fail.
        assert!(!avail.claim(customer(), until, now));
    }

    #[test]
    fn expired_hold_is_claimable_again() {
        let now = Utc::now();
        let first = customer();
        let mut avail = free();
        assert!(avail.claim(first, now - Duration::seconds(1), now - Duration::minutes(15)));

        let second = customer();
        assert!(avail.claim(second, now + Duration::minutes(15), now));
        assert_eq!(avail.holder(), Some(second));
    }

    #[test]
    fn release_clears_hold_and_is_idempotent() {
        let now = Utc::now();
        let mut avail = free();
        avail.claim(customer(), now + Duration::minutes(15), now);

        assert!(avail.release());
        assert!(avail.holder().is_none());
        assert!(avail.reserved_until().is_none());
        assert!(!avail.release());
    }

    #[test]
    fn mark_sold_requires_a_hold() {
        let now = Utc::now();
        let sold_until = now + Duration::days(30);

        let mut unheld = free();
        assert!(!unheld.mark_sold(sold_until));

        let buyer = customer();
        let mut held = free();
        held.claim(buyer, now + Duration::minutes(15), now);
        assert!(held.mark_sold(sold_until));
        assert_eq!(held.holder(), Some(buyer));
        assert!(held.reserved_until().is_none());
        assert_eq!(held.sold_until(), Some(sold_until));
        assert!(!held.is_reservable(now));
    }

    #[test]
    fn lapsed_sold_window_frees_the_product() {
        let then = Utc::now() - Duration::days(31);
        let now = Utc::now();
        let mut avail = free();
        avail.claim(customer(), then + Duration::minutes(15), then);
        avail.mark_sold(then + Duration::days(30));

        assert!(avail.is_reservable(now));
        assert!(avail.clear_expired(now));
        assert!(avail.holder().is_none());
        assert!(avail.sold_until().is_none());
    }

    #[test]
    fn clear_expired_leaves_active_state_alone() {
        let now = Utc::now();
        let holder = customer();
        let mut avail = free();
        avail.claim(holder, now + Duration::minutes(15), now);

        assert!(!avail.clear_expired(now));
        assert_eq!(avail.holder(), Some(holder));
    }
}
