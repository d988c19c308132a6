//! Hotelbook Booking — booking creation as a saga with one compensating step.
//!
//! - [`domain`]: commands accepted by the saga.
//! - [`application`]: the saga itself and read-side query handlers.
//! - [`infrastructure`]: the HTTP client for the hotel service.

pub mod application;
pub mod domain;
pub mod infrastructure;
