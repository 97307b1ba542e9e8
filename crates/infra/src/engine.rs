//! Reservation engine: the one owner of every availability transition.
//!
//! The engine orchestrates the catalog store and the reservation ledger as
//! two independently-failing collaborators. Cross-store consistency is kept
//! with compensating actions, not distributed transactions:
//!
//! - `reserve` claims catalog holds first and releases them again when the
//!   ledger insert fails — no orphaned hold without a ledger row;
//! - `settle` flips the ledger row first and reopens it when the catalog
//!   update fails — never "products sold, ledger still active";
//! - `release` clears the catalog unconditionally; a failing ledger delete
//!   is reported, never allowed to keep products locked.
//!
//! Identity is an opaque [`CustomerId`] argument on every call; the engine
//! has no notion of tokens, cookies or requests.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use leadstock_catalog::ProductFilter;
use leadstock_core::{CustomerId, DomainError, DomainResult, EntityId};
use leadstock_reservations::{PriceSettings, Quote, Reservation, ReservationId};

use crate::catalog_store::CatalogStore;
use crate::ledger::ReservationLedger;
use crate::notify::{FILE_GENERATION_QUEUE, INVOICE_GENERATION_QUEUE, Notifier};
use crate::store::StoreError;
use crate::sweeper::{ExpirySweeper, SweepReport};

/// Engine timing and retry configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a hold lasts.
    pub hold_window: Duration,
    /// Extra slack beyond the window before the sweep deletes a ledger row.
    /// Shields rows from a sweep racing their creation.
    pub sweep_grace: Duration,
    /// Extra delay beyond the window for the per-reservation one-shot timer.
    pub timer_slack: Duration,
    /// How long a sold product stays off the market.
    pub sold_window: Duration,
    /// How many lost claim races to retry before settling for fewer products.
    pub claim_retries: u32,
    /// Arm a one-shot sweep timer per successful reserve. The interval and
    /// eager sweeps do not depend on this.
    pub arm_expiry_timers: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hold_window: Duration::minutes(15),
            sweep_grace: Duration::seconds(12),
            timer_slack: Duration::seconds(3),
            sold_window: Duration::days(30),
            claim_retries: 3,
            arm_expiry_timers: true,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> DomainResult<()> {
        if self.hold_window <= Duration::zero() {
            return Err(DomainError::configuration("hold window must be positive"));
        }
        if self.sold_window <= Duration::zero() {
            return Err(DomainError::configuration("sold window must be positive"));
        }
        if self.sweep_grace < Duration::zero() || self.timer_slack < Duration::zero() {
            return Err(DomainError::configuration(
                "grace and slack cannot be negative",
            ));
        }
        Ok(())
    }
}

/// Engine operation error.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No active reservation (or product) to act on.
    #[error("no active reservation")]
    NotFound,

    /// Rejected input: non-positive quantity, malformed filter.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A concurrent transition won; the operation did not apply.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A collaborator store failed. Retriable by the caller; never masked as
    /// an empty result.
    #[error(transparent)]
    Upstream(#[from] StoreError),

    /// Invalid static configuration, raised at construction.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl From<DomainError> for EngineError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound => EngineError::NotFound,
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                EngineError::InvalidInput(msg)
            }
            DomainError::Conflict(msg) | DomainError::InvariantViolation(msg) => {
                EngineError::Conflict(msg)
            }
            DomainError::Configuration(msg) => EngineError::Configuration(msg),
        }
    }
}

/// A reservation with its freshly computed price fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedReservation {
    pub reservation: Reservation,
    pub price: Quote,
}

/// Outcome of a reserve attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReserveOutcome {
    /// Products were claimed — possibly fewer than requested when inventory
    /// ran short (the recorded quantity is what was actually claimed).
    Reserved(PricedReservation),
    /// Nothing reservable matched the filter. A soft outcome, distinct from
    /// any error.
    NoneAvailable,
}

impl ReserveOutcome {
    pub fn reservation(&self) -> Option<&PricedReservation> {
        match self {
            ReserveOutcome::Reserved(priced) => Some(priced),
            ReserveOutcome::NoneAvailable => None,
        }
    }
}

/// Orchestrates reserve / read / release / settle over the two stores.
pub struct ReservationEngine<C, L, N> {
    catalog: Arc<C>,
    ledger: Arc<L>,
    notifier: Arc<N>,
    sweeper: Arc<ExpirySweeper<C, L>>,
    config: EngineConfig,
    prices: PriceSettings,
}

impl<C, L, N> ReservationEngine<C, L, N>
where
    C: CatalogStore + 'static,
    L: ReservationLedger + 'static,
    N: Notifier,
{
    /// Build an engine. Price and timing configuration are validated here —
    /// bad settings fail the process at startup, not a request.
    pub fn new(
        catalog: Arc<C>,
        ledger: Arc<L>,
        notifier: Arc<N>,
        config: EngineConfig,
        prices: PriceSettings,
    ) -> Result<Self, EngineError> {
        prices.validate()?;
        config.validate()?;
        let sweeper = Arc::new(ExpirySweeper::new(
            Arc::clone(&catalog),
            Arc::clone(&ledger),
            config.clone(),
        ));
        Ok(Self {
            catalog,
            ledger,
            notifier,
            sweeper,
            config,
            prices,
        })
    }

    /// The engine's sweeper, for wiring up the interval background task.
    pub fn sweeper(&self) -> Arc<ExpirySweeper<C, L>> {
        Arc::clone(&self.sweeper)
    }

    /// Hold up to `quantity` products matching `filter` for the customer.
    ///
    /// Any prior reservation of the customer is released first, so at most
    /// one is ever active. Lost claim races are retried a bounded number of
    /// times; a shortfall reserves fewer products rather than failing.
    pub async fn reserve(
        &self,
        customer_id: CustomerId,
        filter: ProductFilter,
        quantity: u32,
    ) -> Result<ReserveOutcome, EngineError> {
        if quantity == 0 {
            return Err(EngineError::InvalidInput(
                "quantity must be positive".to_string(),
            ));
        }
        filter.validate()?;

        let now = Utc::now();
        self.sweeper.sweep(now).await?;
        self.release_internal(customer_id).await?;

        let until = now + self.config.hold_window;
        let claimed_total = self.claim_with_retry(customer_id, &filter, quantity, until, now).await?;

        if claimed_total == 0 {
            info!(customer = %customer_id, "no reservable products matched the filter");
            return Ok(ReserveOutcome::NoneAvailable);
        }

        let reservation = Reservation::hold(
            ReservationId::new(EntityId::new()),
            customer_id,
            filter,
            claimed_total,
            now,
        );

        if let Err(err) = self.ledger.insert_active(&reservation).await {
            // Compensate: holds without a ledger row must not survive.
            if let Err(release_err) = self.catalog.release_held_by(customer_id).await {
                error!(
                    customer = %customer_id,
                    error = %release_err,
                    "compensating release failed; holds remain until the sweep clears them"
                );
            }
            return Err(err.into());
        }

        if self.config.arm_expiry_timers {
            Arc::clone(&self.sweeper).arm(self.config.hold_window + self.config.timer_slack);
        }

        let price = self.prices.quote(reservation.quantity())?;
        info!(
            customer = %customer_id,
            reservation = %reservation.id(),
            quantity = reservation.quantity(),
            requested = quantity,
            "products reserved"
        );
        Ok(ReserveOutcome::Reserved(PricedReservation {
            reservation,
            price,
        }))
    }

    /// Claim candidates until `quantity` is reached, candidates run out, or
    /// the retry budget for lost races is spent.
    async fn claim_with_retry(
        &self,
        customer_id: CustomerId,
        filter: &ProductFilter,
        quantity: u32,
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u32, EngineError> {
        let mut claimed_total: u32 = 0;
        let mut lost_races: u32 = 0;

        while claimed_total < quantity {
            let remaining = quantity - claimed_total;
            let candidates = self.catalog.find_reservable(filter, remaining, now).await?;
            if candidates.is_empty() {
                break;
            }

            let claimed = self
                .catalog
                .claim_if_free(&candidates, customer_id, until, now)
                .await?;
            claimed_total += claimed as u32;

            if (claimed as usize) < candidates.len() {
                // Someone else claimed part of our selection between the
                // query and the conditional write.
                lost_races += 1;
                if lost_races > self.config.claim_retries {
                    warn!(
                        customer = %customer_id,
                        claimed = claimed_total,
                        requested = quantity,
                        "claim retries exhausted; reserving fewer than requested"
                    );
                    break;
                }
            }
        }

        Ok(claimed_total)
    }

    /// The customer's active reservation with fresh price fields.
    ///
    /// Sweeps first so a stale hold never leaks into a read; a hold past its
    /// window reports [`EngineError::NotFound`] even before the sweep's
    /// grace period has deleted the row.
    pub async fn get_active(
        &self,
        customer_id: CustomerId,
    ) -> Result<PricedReservation, EngineError> {
        let now = Utc::now();
        self.sweeper.sweep(now).await?;

        let reservation = self
            .ledger
            .find_active_by_customer(customer_id)
            .await?
            .ok_or(EngineError::NotFound)?;

        if reservation.is_expired(self.config.hold_window, now) {
            return Err(EngineError::NotFound);
        }

        let price = self.prices.quote(reservation.quantity())?;
        Ok(PricedReservation { reservation, price })
    }

    /// Release the customer's reservation, if any. Idempotent: `false` when
    /// there was nothing to release.
    pub async fn release(&self, customer_id: CustomerId) -> Result<bool, EngineError> {
        let changed = self.release_internal(customer_id).await?;
        if changed {
            info!(customer = %customer_id, "reservation released");
        }
        Ok(changed)
    }

    /// Clear catalog holds first; the catalog must never keep a stale hold
    /// because the ledger side failed, so ledger trouble is logged and
    /// swallowed here.
    async fn release_internal(&self, customer_id: CustomerId) -> Result<bool, EngineError> {
        let released = self.catalog.release_held_by(customer_id).await?;

        let mut row_removed = false;
        match self.ledger.find_active_by_customer(customer_id).await {
            Ok(Some(reservation)) => match self.ledger.delete(reservation.id()).await {
                Ok(removed) => row_removed = removed,
                Err(err) => error!(
                    customer = %customer_id,
                    reservation = %reservation.id(),
                    error = %err,
                    "holds released but the ledger row could not be deleted"
                ),
            },
            Ok(None) => {}
            Err(err) => error!(
                customer = %customer_id,
                error = %err,
                "holds released but the ledger could not be read"
            ),
        }

        Ok(released > 0 || row_removed)
    }

    /// Convert the customer's active hold into a settled sale.
    ///
    /// The ledger row is retained as the audit trail consumed by order
    /// creation. Downstream file/invoice generation is notified
    /// fire-and-forget.
    pub async fn settle(&self, customer_id: CustomerId) -> Result<Reservation, EngineError> {
        let now = Utc::now();

        let mut reservation = self
            .ledger
            .find_active_by_customer(customer_id)
            .await?
            .ok_or(EngineError::NotFound)?;

        if reservation.is_expired(self.config.hold_window, now) {
            return Err(EngineError::NotFound);
        }
        let held_from = reservation.reserved_from().ok_or_else(|| {
            EngineError::Conflict("active reservation without a hold timestamp".to_string())
        })?;

        if !self.ledger.settle(reservation.id(), now).await? {
            // Lost to a concurrent settle/release/sweep.
            return Err(EngineError::NotFound);
        }

        let sold_until = now + self.config.sold_window;
        let marked = match self.catalog.mark_sold(customer_id, sold_until).await {
            Ok(marked) => marked,
            Err(err) => {
                self.reopen_after_failed_settle(&reservation, held_from).await;
                return Err(err.into());
            }
        };

        if marked == 0 {
            // The holds vanished under us (expired and swept); put the ledger
            // row back so the caller can retry or release.
            self.reopen_after_failed_settle(&reservation, held_from).await;
            return Err(EngineError::Conflict(
                "no held products left to settle".to_string(),
            ));
        }
        if marked != u64::from(reservation.quantity()) {
            error!(
                customer = %customer_id,
                reservation = %reservation.id(),
                expected = reservation.quantity(),
                marked,
                "settled product count does not match the reservation quantity"
            );
        }

        reservation.settle(now)?;

        for queue in [FILE_GENERATION_QUEUE, INVOICE_GENERATION_QUEUE] {
            if let Err(err) = self
                .notifier
                .publish(queue, &reservation.id().to_string())
                .await
            {
                warn!(
                    queue,
                    reservation = %reservation.id(),
                    error = %err,
                    "downstream notification failed"
                );
            }
        }

        info!(
            customer = %customer_id,
            reservation = %reservation.id(),
            quantity = reservation.quantity(),
            "reservation settled"
        );
        Ok(reservation)
    }

    async fn reopen_after_failed_settle(
        &self,
        reservation: &Reservation,
        held_from: DateTime<Utc>,
    ) {
        if let Err(err) = self.ledger.reopen(reservation.id(), held_from).await {
            error!(
                reservation = %reservation.id(),
                error = %err,
                "failed to reopen the reservation after a catalog error"
            );
        }
    }

    /// Run one sweep pass now. Exposed for on-demand maintenance; the engine
    /// already sweeps eagerly on reads and reserves.
    pub async fn sweep_expired(&self) -> Result<SweepReport, EngineError> {
        Ok(self.sweeper.sweep(Utc::now()).await?)
    }
}
