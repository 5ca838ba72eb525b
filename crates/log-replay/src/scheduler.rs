//! Timed release of batches.
//!
//! Exactly one batch is in flight at a time: [`Scheduler::dispatch`] waits for
//! the batch's mapped deadline or for cancellation, whichever comes first, and
//! only returns once the batch has been flushed or discarded.

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::batch::Batch;
use crate::clock::ClockMapping;

/// Outcome of dispatching one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The batch was emitted; carries the number of lines.
    Flushed(usize),
    /// Cancellation was observed; the batch was discarded unflushed.
    Cancelled,
}

/// Waits on the clock mapping and flushes batches through a callback.
#[derive(Debug, Clone)]
pub struct Scheduler {
    token: CancellationToken,
}

impl Scheduler {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Wait until `batch` is due, then emit its lines in order.
    ///
    /// A deadline already in the past fires immediately, which also absorbs
    /// drift accumulated by earlier waits and callback time.
    pub async fn dispatch<F>(&self, batch: Batch, mapping: &ClockMapping, emit: &mut F) -> Dispatch
    where
        F: FnMut(String),
    {
        if self.token.is_cancelled() {
            return Dispatch::Cancelled;
        }

        let deadline = mapping.deadline(&batch.anchor());
        let now = Instant::now();

        if deadline > now {
            trace!(
                delay_ms = (deadline - now).as_millis() as u64,
                lines = batch.len(),
                "Waiting for batch"
            );
            tokio::select! {
                biased;

                _ = self.token.cancelled() => {
                    debug!(lines = batch.len(), "Cancelled while waiting, discarding batch");
                    return Dispatch::Cancelled;
                }
                _ = tokio::time::sleep_until(deadline) => {}
            }
        } else {
            trace!(
                late_ms = (now - deadline).as_millis() as u64,
                lines = batch.len(),
                "Batch already due"
            );
        }

        let count = batch.len();
        for line in batch.into_lines() {
            emit(line);
        }
        Dispatch::Flushed(count)
    }
}
