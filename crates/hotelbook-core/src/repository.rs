//! Booking repository abstraction.

use async_trait::async_trait;
use uuid::Uuid;

use crate::booking::{BookingRecord, BookingStatus};
use crate::error::DomainError;

/// Repository trait for booking records.
///
/// Status writes go through [`BookingRepository::transition`], a
/// compare-and-set on the stored status, so the state machine holds even
/// when two writers race.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Persist a new record.
    async fn insert(&self, record: &BookingRecord) -> Result<(), DomainError>;

    /// Move a record from `from` to `to`.
    ///
    /// Returns `DomainError::NotFound` if no record has this id, and
    /// `DomainError::InvalidTransition` if the stored status is not `from`
    /// or the edge is not part of the transition graph.
    async fn transition(
        &self,
        booking_id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<(), DomainError>;

    /// Load one record.
    async fn find(&self, booking_id: Uuid) -> Result<Option<BookingRecord>, DomainError>;

    /// Load every record of a user, oldest first.
    async fn find_by_user(&self, user_id: &str) -> Result<Vec<BookingRecord>, DomainError>;
}
