//! Infrastructure layer: storage adapters, engine orchestration, background sweeping.

pub mod catalog_store;
pub mod engine;
pub mod ledger;
pub mod notify;
pub mod store;
pub mod sweeper;


pub use catalog_store::{CatalogStore, InMemoryCatalog, PostgresCatalog};
pub use engine::{EngineConfig, EngineError, PricedReservation, ReservationEngine, ReserveOutcome};
pub use ledger::{InMemoryLedger, PostgresLedger, ReservationLedger};
pub use notify::{InMemoryNotifier, Notifier, NotifyError};
pub use store::StoreError;
pub use sweeper::{ExpirySweeper, SweepReport, SweeperHandle};
