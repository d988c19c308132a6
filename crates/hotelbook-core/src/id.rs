//! Identifier generation abstraction.
//!
//! Booking ids and message ids are drawn from an injected generator so that
//! tests can predict them.

use uuid::Uuid;

/// Source of fresh unique identifiers.
pub trait IdGenerator: Send + Sync {
    /// Returns a new identifier, never returned before by this generator.
    fn next_id(&self) -> Uuid;
}

/// Production generator backed by random (v4) UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn next_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}
