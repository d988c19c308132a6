//! Hotelbook Notifications — the booking-confirmation consumer.
//!
//! The handler is driven by the broker's consumer runtime on the
//! `booking.created` queue. Rendering is pure, so a redelivered event yields
//! the same message; duplicates are accepted rather than suppressed.

pub mod handler;
pub mod mailer;
pub mod render;

pub use handler::BookingConfirmationHandler;
pub use mailer::TracingMailer;
