//! Expiry sweeping: the authoritative backstop that clears stale holds.
//!
//! Three triggers share the same sweep:
//! - eagerly, before every reservation read (and before a new reserve);
//! - a one-shot task armed per reservation for window + slack;
//! - a fixed-interval background task.
//!
//! Each armed timer is an independent spawned task — a new reservation never
//! displaces the countdown of another customer's reservation. Timers are
//! best-effort (lost on restart); the eager and interval sweeps carry the
//! correctness load.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::catalog_store::CatalogStore;
use crate::engine::EngineConfig;
use crate::ledger::ReservationLedger;
use crate::store::StoreError;

/// What one sweep pass cleared.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct SweepReport {
    /// Products whose expired hold or lapsed sold window was cleared.
    pub products_cleared: u64,
    /// Active ledger rows deleted as past window + grace.
    pub reservations_deleted: u64,
}

/// Handle to control a running interval sweeper.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    join: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Request graceful shutdown and wait for the task to stop.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

/// Clears expired product holds and stale ledger rows.
pub struct ExpirySweeper<C, L> {
    catalog: Arc<C>,
    ledger: Arc<L>,
    config: EngineConfig,
}

impl<C, L> ExpirySweeper<C, L>
where
    C: CatalogStore + 'static,
    L: ReservationLedger + 'static,
{
    pub fn new(catalog: Arc<C>, ledger: Arc<L>, config: EngineConfig) -> Self {
        Self {
            catalog,
            ledger,
            config,
        }
    }

    /// Run one sweep pass at `now`.
    ///
    /// Product holds clear as soon as `reserved_until` passes; ledger rows
    /// only once the grace period beyond the window has lapsed, so a sweep
    /// racing a just-created or just-read reservation never deletes it.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, StoreError> {
        let products_cleared = self.catalog.sweep_expired(now).await?;
        let cutoff = now - self.config.hold_window - self.config.sweep_grace;
        let reservations_deleted = self.ledger.delete_expired(cutoff).await?;

        if products_cleared > 0 || reservations_deleted > 0 {
            debug!(products_cleared, reservations_deleted, "expired holds swept");
        }
        Ok(SweepReport {
            products_cleared,
            reservations_deleted,
        })
    }

    /// Arm a one-shot countdown that sweeps after `delay`.
    ///
    /// Every call spawns its own detached task; concurrent reservations each
    /// get their own countdown.
    pub fn arm(self: Arc<Self>, delay: Duration) {
        let delay = delay.to_std().unwrap_or(StdDuration::ZERO);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(err) = self.sweep(Utc::now()).await {
                warn!(error = %err, "timer-driven sweep failed");
            }
        });
    }

    /// Spawn the fixed-interval background sweep.
    ///
    /// Independent of any single reservation's timer, so expiry never depends
    /// on an in-memory timer surviving.
    pub fn spawn_interval(self: Arc<Self>, period: StdDuration) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let join = tokio::spawn(async move {
            info!(period_ms = period.as_millis() as u64, "interval sweeper started");
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = self.sweep(Utc::now()).await {
                            warn!(error = %err, "interval sweep failed");
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("interval sweeper stopped");
        });

        SweeperHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        }
    }
}
