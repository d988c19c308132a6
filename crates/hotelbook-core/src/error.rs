//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

use crate::booking::BookingStatus;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A booking was not found.
    #[error("booking not found: {0}")]
    NotFound(Uuid),

    /// A status change that the booking state machine does not allow, or
    /// whose expected current status no longer matches storage.
    #[error("invalid status transition on booking {booking_id}: {from} -> {to}")]
    InvalidTransition {
        /// The booking whose status was to change.
        booking_id: Uuid,
        /// The status the caller expected the booking to be in.
        from: BookingStatus,
        /// The requested status.
        to: BookingStatus,
    },

    /// A validation error in domain logic.
    #[error("validation error: {0}")]
    Validation(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}
