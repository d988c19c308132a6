//! The booking record and its status machine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Lifecycle status of a booking.
///
/// `Pending` is the only initial state; `Confirmed` and `Cancelled` are
/// terminal. A booking never re-enters `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    /// Written locally, awaiting the inventory registration.
    Pending,
    /// Inventory registration succeeded.
    Confirmed,
    /// Inventory registration failed and the booking was compensated.
    Cancelled,
}

impl BookingStatus {
    /// Returns the storage/wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether the status admits no further transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Whether moving from `self` to `next` is an edge of the transition graph.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed | Self::Cancelled)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(DomainError::Validation(format!(
                "unknown booking status: {other}"
            ))),
        }
    }
}

/// Booking details supplied by the caller, before an id is assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBooking {
    /// The booking user.
    pub user_id: String,
    /// The booked hotel.
    pub hotel_id: String,
    /// Guest first name.
    pub first_name: String,
    /// Guest last name.
    pub last_name: String,
    /// Guest contact email.
    pub email: String,
    /// Number of adults.
    pub adult_count: u32,
    /// Number of children.
    pub child_count: u32,
    /// Arrival date.
    pub check_in: NaiveDate,
    /// Departure date.
    pub check_out: NaiveDate,
    /// Total cost of the stay, computed upstream from the nightly rate.
    pub total_cost: f64,
    /// Reference of the already-verified external payment.
    pub payment_intent_id: String,
}

impl NewBooking {
    /// Checks the stay and occupancy invariants.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` describing the first violated rule.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.check_out <= self.check_in {
            return Err(DomainError::Validation(format!(
                "check-out {} must be after check-in {}",
                self.check_out, self.check_in
            )));
        }
        if self.adult_count == 0 {
            return Err(DomainError::Validation(
                "at least one adult is required".into(),
            ));
        }
        if !self.total_cost.is_finite() || self.total_cost < 0.0 {
            return Err(DomainError::Validation(format!(
                "total cost must be a non-negative amount, got {}",
                self.total_cost
            )));
        }
        if self.email.trim().is_empty() {
            return Err(DomainError::Validation("contact email is required".into()));
        }
        for (field, count) in [("adult_count", self.adult_count), ("child_count", self.child_count)] {
            if count > MAX_OCCUPANCY {
                return Err(DomainError::Validation(format!(
                    "{field} must be at most {MAX_OCCUPANCY}, got {count}"
                )));
            }
        }
        for (field, value, max) in [
            ("user_id", &self.user_id, MAX_TEXT_LEN),
            ("hotel_id", &self.hotel_id, MAX_TEXT_LEN),
            ("first_name", &self.first_name, MAX_TEXT_LEN),
            ("last_name", &self.last_name, MAX_TEXT_LEN),
            ("payment_intent_id", &self.payment_intent_id, MAX_TEXT_LEN),
            ("email", &self.email, MAX_EMAIL_LEN),
        ] {
            if value.chars().count() > max {
                return Err(DomainError::Validation(format!(
                    "{field} must be at most {max} characters"
                )));
            }
        }
        if self.user_id.trim().is_empty() {
            return Err(DomainError::Validation("user id is required".into()));
        }
        if !is_path_segment(&self.hotel_id) {
            return Err(DomainError::Validation(format!(
                "hotel id {:?} is not a valid identifier",
                self.hotel_id
            )));
        }
        Ok(())
    }
}

/// Longest name or identifier the booking store accepts.
pub const MAX_TEXT_LEN: usize = 255;

/// Longest email address the booking store accepts.
pub const MAX_EMAIL_LEN: usize = 320;

/// Largest occupancy count the booking store accepts.
pub const MAX_OCCUPANCY: u32 = i32::MAX.unsigned_abs();

/// Hotel ids address hotel service resources, so each must be one plain
/// URL path segment.
fn is_path_segment(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && !id
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '/' | '\\' | '?' | '#' | '%'))
}

/// A booking as persisted by the booking store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRecord {
    /// Unique booking identifier, assigned at creation.
    pub id: Uuid,
    /// The booking user.
    pub user_id: String,
    /// The booked hotel.
    pub hotel_id: String,
    /// Guest first name.
    pub first_name: String,
    /// Guest last name.
    pub last_name: String,
    /// Guest contact email.
    pub email: String,
    /// Number of adults.
    pub adult_count: u32,
    /// Number of children.
    pub child_count: u32,
    /// Arrival date.
    pub check_in: NaiveDate,
    /// Departure date.
    pub check_out: NaiveDate,
    /// Total cost of the stay.
    pub total_cost: f64,
    /// Reference of the external payment.
    pub payment_intent_id: String,
    /// Current lifecycle status.
    pub status: BookingStatus,
    /// When the record was first written.
    pub created_at: DateTime<Utc>,
}

impl BookingRecord {
    /// Builds a new record in the `Pending` state.
    #[must_use]
    pub fn pending(details: NewBooking, id: Uuid, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: details.user_id,
            hotel_id: details.hotel_id,
            first_name: details.first_name,
            last_name: details.last_name,
            email: details.email,
            adult_count: details.adult_count,
            child_count: details.child_count,
            check_in: details.check_in,
            check_out: details.check_out,
            total_cost: details.total_cost,
            payment_intent_id: details.payment_intent_id,
            status: BookingStatus::Pending,
            created_at,
        }
    }

    /// Number of nights between check-in and check-out.
    #[must_use]
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    /// Moves the record to `next`, enforcing the transition graph.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` if the edge does not exist.
    pub fn transition_to(&mut self, next: BookingStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidTransition {
                booking_id: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}
