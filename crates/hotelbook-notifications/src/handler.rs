//! Booking-confirmation event handler.

use std::sync::Arc;

use async_trait::async_trait;
use hotelbook_broker::{EventHandler, HandlerError};
use hotelbook_core::event::{DomainEvent, EventEnvelope};
use hotelbook_core::mail::{MailError, Mailer};
use tracing::info;

use crate::render::booking_confirmation;

/// Sends a confirmation email for every `BOOKING_CREATED` event.
///
/// A transport failure is retried by the consumer runtime; a refused
/// message is dead-lettered straight away.
#[derive(Clone)]
pub struct BookingConfirmationHandler {
    mailer: Arc<dyn Mailer>,
}

impl BookingConfirmationHandler {
    /// Creates a handler sending through `mailer`.
    #[must_use]
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }
}

#[async_trait]
impl EventHandler for BookingConfirmationHandler {
    async fn handle(&self, envelope: &EventEnvelope) -> Result<(), HandlerError> {
        let DomainEvent::BookingCreated(event) = &envelope.event;

        let message = booking_confirmation(event);
        self.mailer.send(&message).await.map_err(|e| match e {
            MailError::Transport(_) => HandlerError::Failed(e.to_string()),
            MailError::Rejected(_) => HandlerError::Permanent(e.to_string()),
        })?;

        info!(
            event_id = %envelope.id,
            booking_id = %event.booking_id,
            "booking confirmation sent"
        );
        Ok(())
    }
}
