//! The booking-creation saga.
//!
//! 1. Write the booking as `pending`.
//! 2. Register the stay with the hotel service.
//! 3. On failure, compensate by moving the booking to `cancelled`.
//! 4. Otherwise move it to `confirmed`.
//! 5. Optionally publish `BOOKING_CREATED`. Failures here never undo step 4.
//!
//! There is no durable saga log: a crash between steps 2 and 4 leaves the
//! booking `pending` with a reservation already registered.

use std::sync::Arc;

use hotelbook_broker::BookingEventPublisher;
use hotelbook_core::booking::{BookingRecord, BookingStatus};
use hotelbook_core::clock::Clock;
use hotelbook_core::error::DomainError;
use hotelbook_core::event::{BookingCreated, EventEnvelope};
use hotelbook_core::id::IdGenerator;
use hotelbook_core::inventory::{HotelDirectory, InventoryService};
use hotelbook_core::repository::BookingRepository;
use thiserror::Error;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::commands::CreateBooking;

/// Why a saga run did not produce a confirmed booking.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The booking details were rejected before anything was written.
    #[error("invalid booking: {0}")]
    Validation(String),

    /// A local write failed. When the pending write fails nothing happened;
    /// when the confirm write fails the booking stays `pending`.
    #[error("failed to persist booking: {0}")]
    Persistence(#[source] DomainError),

    /// The hotel service refused the stay and the booking was cancelled.
    #[error("booking {booking_id} was cancelled: {reason}")]
    Compensated {
        /// The cancelled booking.
        booking_id: Uuid,
        /// The hotel service failure.
        reason: String,
    },

    /// The hotel service refused the stay and cancelling the booking failed
    /// too; the booking may still be `pending`.
    #[error("booking {booking_id} failed ({reason}) and could not be cancelled: {compensation_error}")]
    CompensationFailed {
        /// The booking left behind.
        booking_id: Uuid,
        /// The hotel service failure.
        reason: String,
        /// The failure of the compensating write.
        compensation_error: String,
    },
}

/// Result of a successful saga run.
#[derive(Debug, Clone)]
pub struct SagaOutcome {
    /// The confirmed booking.
    pub booking: BookingRecord,
    /// The published event, when publishing is enabled and succeeded.
    pub event: Option<EventEnvelope>,
    /// Why the event was not published, when publishing is enabled and
    /// failed. The booking is confirmed regardless.
    pub notification_error: Option<String>,
}

/// Coordinates the local booking write with the hotel service.
#[derive(Clone)]
pub struct CreateBookingSaga {
    repository: Arc<dyn BookingRepository>,
    inventory: Arc<dyn InventoryService>,
    hotels: Arc<dyn HotelDirectory>,
    publisher: Option<BookingEventPublisher>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl CreateBookingSaga {
    /// Creates a saga that does not publish events.
    #[must_use]
    pub fn new(
        repository: Arc<dyn BookingRepository>,
        inventory: Arc<dyn InventoryService>,
        hotels: Arc<dyn HotelDirectory>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            repository,
            inventory,
            hotels,
            publisher: None,
            clock,
            ids,
        }
    }

    /// Publishes `BOOKING_CREATED` after every confirmation.
    #[must_use]
    pub fn with_publisher(mut self, publisher: BookingEventPublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Runs the saga. Every run creates a new booking id.
    ///
    /// # Errors
    ///
    /// Returns `SagaError::Validation` or `SagaError::Persistence` when the
    /// pending write did not happen, `SagaError::Compensated` or
    /// `SagaError::CompensationFailed` when the hotel service refused the
    /// stay, and `SagaError::Persistence` when the confirm write failed.
    #[instrument(
        skip_all,
        fields(
            correlation_id = %command.correlation_id,
            hotel_id = %command.booking.hotel_id,
            user_id = %command.booking.user_id,
        )
    )]
    pub async fn execute(&self, command: CreateBooking) -> Result<SagaOutcome, SagaError> {
        command.booking.validate().map_err(|e| match e {
            DomainError::Validation(message) => SagaError::Validation(message),
            other => SagaError::Validation(other.to_string()),
        })?;

        let mut booking = BookingRecord::pending(command.booking, self.ids.next_id(), self.clock.now());
        self.repository
            .insert(&booking)
            .await
            .map_err(SagaError::Persistence)?;
        info!(booking_id = %booking.id, "booking pending");

        if let Err(e) = self
            .inventory
            .register_booking(&booking.hotel_id, booking.id, booking.check_in, booking.check_out)
            .await
        {
            return Err(self.compensate(booking.id, &e.to_string()).await);
        }

        self.repository
            .transition(booking.id, BookingStatus::Pending, BookingStatus::Confirmed)
            .await
            .map_err(|e| {
                error!(
                    booking_id = %booking.id,
                    error = %e,
                    "confirm write failed after the stay was registered"
                );
                SagaError::Persistence(e)
            })?;
        booking
            .transition_to(BookingStatus::Confirmed)
            .map_err(SagaError::Persistence)?;
        info!(booking_id = %booking.id, "booking confirmed");

        let (event, notification_error) = match &self.publisher {
            Some(publisher) => match self.announce(publisher, &booking).await {
                Ok(envelope) => (Some(envelope), None),
                Err(reason) => {
                    warn!(booking_id = %booking.id, reason = %reason, "booking event not published");
                    (None, Some(reason))
                }
            },
            None => (None, None),
        };

        Ok(SagaOutcome {
            booking,
            event,
            notification_error,
        })
    }

    /// Cancels the pending booking after the hotel service refused it.
    async fn compensate(&self, booking_id: Uuid, reason: &str) -> SagaError {
        warn!(booking_id = %booking_id, reason = %reason, "hotel service refused booking, cancelling");

        match self
            .repository
            .transition(booking_id, BookingStatus::Pending, BookingStatus::Cancelled)
            .await
        {
            Ok(()) => {
                info!(booking_id = %booking_id, "booking cancelled");
                SagaError::Compensated {
                    booking_id,
                    reason: reason.to_owned(),
                }
            }
            Err(e) => {
                error!(booking_id = %booking_id, error = %e, "compensation failed");
                SagaError::CompensationFailed {
                    booking_id,
                    reason: reason.to_owned(),
                    compensation_error: e.to_string(),
                }
            }
        }
    }

    async fn announce(
        &self,
        publisher: &BookingEventPublisher,
        booking: &BookingRecord,
    ) -> Result<EventEnvelope, String> {
        let hotel = self
            .hotels
            .hotel(&booking.hotel_id)
            .await
            .map_err(|e| format!("hotel lookup failed: {e}"))?;
        publisher
            .publish_booking_created(BookingCreated::from_booking(booking, &hotel))
            .await
            .map_err(|e| e.to_string())
    }
}
