//! Test repositories — mock `BookingRepository` implementations for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use hotelbook_core::booking::{BookingRecord, BookingStatus};
use hotelbook_core::error::DomainError;
use hotelbook_core::repository::BookingRepository;
use uuid::Uuid;

/// A booking repository backed by a vector. Enforces the status transition
/// graph the same way the database does and records every transition
/// attempt. Individual target statuses can be made to fail.
#[derive(Debug, Default)]
pub struct InMemoryBookingRepository {
    records: Mutex<Vec<BookingRecord>>,
    transitions: Mutex<Vec<(Uuid, BookingStatus, BookingStatus)>>,
    failing_targets: Mutex<Vec<BookingStatus>>,
}

impl InMemoryBookingRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every transition into `status` fail with an infrastructure error.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn failing_transitions_to(self, status: BookingStatus) -> Self {
        self.failing_targets.lock().unwrap().push(status);
        self
    }

    /// Returns a snapshot of all stored records in insertion order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn records(&self) -> Vec<BookingRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Returns every transition attempt, including failed ones.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn transitions(&self) -> Vec<(Uuid, BookingStatus, BookingStatus)> {
        self.transitions.lock().unwrap().clone()
    }
}

#[async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn insert(&self, record: &BookingRecord) -> Result<(), DomainError> {
        let mut records = self.records.lock().unwrap();
        if records.iter().any(|r| r.id == record.id) {
            return Err(DomainError::Infrastructure(format!(
                "duplicate booking id {}",
                record.id
            )));
        }
        records.push(record.clone());
        Ok(())
    }

    async fn transition(
        &self,
        booking_id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<(), DomainError> {
        self.transitions.lock().unwrap().push((booking_id, from, to));

        if self.failing_targets.lock().unwrap().contains(&to) {
            return Err(DomainError::Infrastructure("connection reset".into()));
        }

        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id == booking_id)
            .ok_or(DomainError::NotFound(booking_id))?;
        if record.status != from {
            return Err(DomainError::InvalidTransition {
                booking_id,
                from: record.status,
                to,
            });
        }
        record.transition_to(to)
    }

    async fn find(&self, booking_id: Uuid) -> Result<Option<BookingRecord>, DomainError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == booking_id)
            .cloned())
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<BookingRecord>, DomainError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }
}

/// A booking repository that always returns an infrastructure error. Useful
/// for testing error-handling paths.
#[derive(Debug)]
pub struct FailingBookingRepository;

#[async_trait]
impl BookingRepository for FailingBookingRepository {
    async fn insert(&self, _record: &BookingRecord) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn transition(
        &self,
        _booking_id: Uuid,
        _from: BookingStatus,
        _to: BookingStatus,
    ) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn find(&self, _booking_id: Uuid) -> Result<Option<BookingRecord>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn find_by_user(&self, _user_id: &str) -> Result<Vec<BookingRecord>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}
