//! Hotelbook API — composition root of the booking service and the
//! notification consumer.

pub mod broker;
pub mod config;
pub mod cors;
pub mod error;
pub mod routes;
pub mod shutdown;
pub mod state;
pub mod telemetry;
