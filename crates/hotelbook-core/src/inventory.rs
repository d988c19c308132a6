//! Outbound ports towards the hotel service.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::event::HotelSnapshot;

/// Failure of a call to the hotel service.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The service answered with a non-2xx status.
    #[error("hotel service rejected the request with status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The service could not be reached or the call timed out.
    #[error("hotel service unavailable: {0}")]
    Unavailable(String),

    /// The service answered 2xx with a body that could not be understood.
    #[error("invalid response from hotel service: {0}")]
    InvalidResponse(String),

    /// The request could not be addressed, e.g. a hotel id that is not a
    /// single path segment. Nothing was sent.
    #[error("invalid hotel service request: {0}")]
    InvalidRequest(String),
}

/// Registers booked dates against a hotel's inventory.
#[async_trait]
pub trait InventoryService: Send + Sync {
    /// Reserves `check_in..check_out` at `hotel_id` for `booking_id`.
    async fn register_booking(
        &self,
        hotel_id: &str,
        booking_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<(), InventoryError>;
}

/// Looks up descriptive hotel fields for display.
#[async_trait]
pub trait HotelDirectory: Send + Sync {
    /// Returns the current name, city and country of `hotel_id`.
    async fn hotel(&self, hotel_id: &str) -> Result<HotelSnapshot, InventoryError>;
}
