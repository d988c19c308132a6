//! Domain layer of the booking context.

pub mod commands;
