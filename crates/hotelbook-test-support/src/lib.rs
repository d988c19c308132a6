//! Shared test mocks and utilities for the hotel booking pipeline.

mod clock;
mod hotel;
mod id;
mod mailer;
mod repository;

pub use clock::FixedClock;
pub use hotel::{InventoryCall, ScriptedInventoryService, StaticHotelDirectory};
pub use id::SequentialIdGenerator;
pub use mailer::{FailingMailer, RecordingMailer};
pub use repository::{FailingBookingRepository, InMemoryBookingRepository};
