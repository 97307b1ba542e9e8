//! Downstream queue notifications.
//!
//! Settling a reservation kicks off file and invoice generation in other
//! services. From the engine's perspective these are fire-and-forget:
//! failures are logged, never retried and never fail the settlement.

use std::sync::Mutex;

use thiserror::Error;
use tracing::debug;

/// Queue consumed by the document/file generation worker.
pub const FILE_GENERATION_QUEUE: &str = "file-generation-queue";
/// Queue consumed by the invoice generation worker.
pub const INVOICE_GENERATION_QUEUE: &str = "invoice-generation-queue";

#[derive(Debug, Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

/// Queue publisher contract. The broker wire format lives behind it.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, queue: &str, payload: &str) -> Result<(), NotifyError>;
}

/// In-memory notifier that records published messages. Tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryNotifier {
    published: Mutex<Vec<(String, String)>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far, as `(queue, payload)` pairs.
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Notifier for InMemoryNotifier {
    async fn publish(&self, queue: &str, payload: &str) -> Result<(), NotifyError> {
        debug!(queue, payload, "message published");
        self.published
            .lock()
            .map_err(|_| NotifyError("notifier lock poisoned".to_string()))?
            .push((queue.to_string(), payload.to_string()));
        Ok(())
    }
}
