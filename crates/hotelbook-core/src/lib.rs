//! Hotelbook Core — shared booking domain types and ports.
//!
//! This crate defines the booking record, its status machine, the domain
//! event wire model and the ports (repository, hotel service, mail) every
//! other crate depends on.
//! It contains no infrastructure code.

pub mod booking;
pub mod clock;
pub mod error;
pub mod event;
pub mod id;
pub mod inventory;
pub mod mail;
pub mod repository;
