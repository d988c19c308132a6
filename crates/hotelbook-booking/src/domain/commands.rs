//! Commands for the booking context.

use hotelbook_core::booking::NewBooking;
use uuid::Uuid;

/// Command to create a booking whose payment was already verified.
#[derive(Debug, Clone)]
pub struct CreateBooking {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The booking details.
    pub booking: NewBooking,
}
