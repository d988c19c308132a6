//! Retry-then-dead-letter policy for failed deliveries.

/// Message header carrying the number of redeliveries already made.
pub const RETRY_COUNT_HEADER: &str = "x-retry-count";

/// Redeliveries allowed before a message is dead-lettered.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// What to do with a delivery whose handler failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Redeliver to the same queue, stamped with `next_retry_count`.
    Retry {
        /// Counter value carried by the redelivered copy.
        next_retry_count: u32,
    },
    /// Reject without requeue; the queue's dead-letter wiring takes over.
    DeadLetter,
}

/// Converts a delivery's retry counter into a [`Disposition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
}

impl RetryPolicy {
    /// A policy allowing `max_retries` redeliveries.
    #[must_use]
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Redeliveries allowed before dead-lettering.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Decides the fate of a failed delivery that carried `retry_count`.
    #[must_use]
    pub fn decide(&self, retry_count: u32) -> Disposition {
        if retry_count < self.max_retries {
            Disposition::Retry {
                next_retry_count: retry_count + 1,
            }
        } else {
            Disposition::DeadLetter
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}
