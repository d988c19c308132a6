//! Hotelbook Booking Store — `PostgreSQL` persistence of booking records.

pub mod pg_booking_repository;
pub mod schema;
