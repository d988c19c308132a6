//! Application layer of the booking context.

pub mod query_handlers;
pub mod saga;
