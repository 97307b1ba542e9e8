//! `leadstock-reservations` — reservation domain model and pricing.
//!
//! A reservation is either an **active hold** (`reserved_from` set) or a
//! **settled sale** (`sold_from` set), never both and never neither. The
//! storage and orchestration layers live in `leadstock-infra`; this crate is
//! pure domain.

pub mod pricing;
pub mod reservation;

pub use pricing::{PriceSettings, Quote};
pub use reservation::{Reservation, ReservationId};
