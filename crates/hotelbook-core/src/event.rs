//! Domain event wire model.
//!
//! Events travel as a JSON envelope:
//!
//! ```json
//! { "type": "BOOKING_CREATED", "id": "...", "timestamp": "...", "data": { ... } }
//! ```
//!
//! The set of event kinds is closed; an unknown `type` tag fails to decode.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::booking::BookingRecord;

/// Type tag of the booking-created event.
pub const BOOKING_CREATED_EVENT_TYPE: &str = "BOOKING_CREATED";

/// Descriptive hotel fields captured at publish time for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotelSnapshot {
    /// Hotel display name.
    pub name: String,
    /// Hotel city.
    pub city: String,
    /// Hotel country.
    pub country: String,
}

/// Emitted once a booking reaches `confirmed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingCreated {
    /// The confirmed booking.
    pub booking_id: Uuid,
    /// The booking user.
    pub user_id: String,
    /// The booked hotel.
    pub hotel_id: String,
    /// Guest contact email.
    pub user_email: String,
    /// Hotel display name at publish time.
    pub hotel_name: String,
    /// Hotel city at publish time.
    pub hotel_city: String,
    /// Hotel country at publish time.
    pub hotel_country: String,
    /// Arrival date.
    pub check_in: NaiveDate,
    /// Departure date.
    pub check_out: NaiveDate,
    /// Number of adults.
    pub adult_count: u32,
    /// Number of children.
    pub child_count: u32,
    /// Total cost of the stay.
    pub total_cost: f64,
    /// Guest first name.
    pub first_name: String,
    /// Guest last name.
    pub last_name: String,
}

impl BookingCreated {
    /// Snapshots a confirmed booking together with hotel display fields.
    #[must_use]
    pub fn from_booking(booking: &BookingRecord, hotel: &HotelSnapshot) -> Self {
        Self {
            booking_id: booking.id,
            user_id: booking.user_id.clone(),
            hotel_id: booking.hotel_id.clone(),
            user_email: booking.email.clone(),
            hotel_name: hotel.name.clone(),
            hotel_city: hotel.city.clone(),
            hotel_country: hotel.country.clone(),
            check_in: booking.check_in,
            check_out: booking.check_out,
            adult_count: booking.adult_count,
            child_count: booking.child_count,
            total_cost: booking.total_cost,
            first_name: booking.first_name.clone(),
            last_name: booking.last_name.clone(),
        }
    }

    /// Number of nights of the stay.
    #[must_use]
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }
}

/// Closed set of domain events carried by the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainEvent {
    /// A booking was confirmed.
    BookingCreated(BookingCreated),
}

impl DomainEvent {
    /// Returns the wire type tag.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::BookingCreated(_) => BOOKING_CREATED_EVENT_TYPE,
        }
    }
}

/// An immutable, identified and timestamped domain event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Message identifier, also used as the transport message id.
    pub id: Uuid,
    /// Publish time.
    pub timestamp: DateTime<Utc>,
    /// Tagged event payload.
    #[serde(flatten)]
    pub event: DomainEvent,
}

impl EventEnvelope {
    /// Wraps an event.
    #[must_use]
    pub fn new(id: Uuid, timestamp: DateTime<Utc>, event: DomainEvent) -> Self {
        Self {
            id,
            timestamp,
            event,
        }
    }

    /// Returns the wire type tag of the wrapped event.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        self.event.event_type()
    }

    /// Serializes the envelope to its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns the serializer error; derived types only fail on non-finite
    /// floating point amounts.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decodes an envelope from its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns the deserializer error for malformed JSON, missing fields or
    /// an unknown `type` tag.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
