//! Bounded concurrency for in-flight calls.

use scrivener_error::{RateLimitError, RateLimitErrorKind};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// Counting semaphore sized to `max_concurrent_requests`.
///
/// Cloning shares the same permits.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    max_permits: usize,
}

impl ConcurrencyGate {
    /// Gate admitting `max_permits` holders at once.
    pub fn new(max_permits: usize) -> Self {
        let max_permits = max_permits.min(Semaphore::MAX_PERMITS);
        Self {
            semaphore: Arc::new(Semaphore::new(max_permits)),
            max_permits,
        }
    }

    /// Wait for a permit.
    ///
    /// The permit is returned to the gate when the guard is dropped, including
    /// when the awaiting future is cancelled.
    pub async fn acquire(&self) -> Result<GatePermit, RateLimitError> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| RateLimitError::new(RateLimitErrorKind::GateClosed))?;
        debug!(available = self.available(), "Acquired concurrency permit");
        Ok(GatePermit { _permit: permit })
    }

    /// Take a permit only if one is free right now.
    pub fn try_acquire(&self) -> Option<GatePermit> {
        Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .ok()
            .map(|permit| GatePermit { _permit: permit })
    }

    /// Permits currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Permits currently held.
    pub fn in_use(&self) -> usize {
        self.max_permits.saturating_sub(self.available())
    }

    /// Configured size of the gate.
    pub fn max_permits(&self) -> usize {
        self.max_permits
    }
}

/// RAII guard for one gate permit.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}
