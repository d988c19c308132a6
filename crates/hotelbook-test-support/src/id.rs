//! Predictable identifiers.

use std::sync::atomic::{AtomicU64, Ordering};

use hotelbook_core::id::IdGenerator;
use uuid::Uuid;

/// Hands out `00000000-0000-0000-0000-000000000001`, `...002`, and so on.
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    issued: AtomicU64,
}

impl SequentialIdGenerator {
    /// Starts the sequence at 1.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The `n`-th id this generator returns, counting from 1.
    #[must_use]
    pub fn nth(n: u64) -> Uuid {
        Uuid::from_u128(u128::from(n))
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> Uuid {
        Self::nth(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }
}
