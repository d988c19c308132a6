//! Shared application state.

use std::sync::Arc;

use hotelbook_booking::application::saga::CreateBookingSaga;
use hotelbook_broker::MessageBroker;
use hotelbook_core::repository::BookingRepository;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Booking persistence.
    pub repository: Arc<dyn BookingRepository>,
    /// The booking-creation saga.
    pub saga: CreateBookingSaga,
    /// The process-wide broker, consulted by the health check.
    pub broker: Arc<dyn MessageBroker>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        repository: Arc<dyn BookingRepository>,
        saga: CreateBookingSaga,
        broker: Arc<dyn MessageBroker>,
    ) -> Self {
        Self {
            repository,
            saga,
            broker,
        }
    }
}
