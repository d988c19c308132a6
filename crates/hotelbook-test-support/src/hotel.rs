//! Test doubles for the hotel service ports.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use hotelbook_core::event::HotelSnapshot;
use hotelbook_core::inventory::{HotelDirectory, InventoryError, InventoryService};
use uuid::Uuid;

/// One recorded `register_booking` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryCall {
    /// Target hotel.
    pub hotel_id: String,
    /// Booking being registered.
    pub booking_id: Uuid,
    /// Arrival date.
    pub check_in: NaiveDate,
    /// Departure date.
    pub check_out: NaiveDate,
}

/// An inventory service that records calls and answers every one with
/// success, or with a fixed HTTP status when built with `rejecting`.
#[derive(Debug, Default)]
pub struct ScriptedInventoryService {
    reject_with: Option<u16>,
    unavailable: bool,
    calls: Mutex<Vec<InventoryCall>>,
}

impl ScriptedInventoryService {
    /// Every call succeeds.
    #[must_use]
    pub fn accepting() -> Self {
        Self::default()
    }

    /// Every call fails with `InventoryError::Rejected { status }`.
    #[must_use]
    pub fn rejecting(status: u16) -> Self {
        Self {
            reject_with: Some(status),
            ..Self::default()
        }
    }

    /// Every call fails with `InventoryError::Unavailable`.
    #[must_use]
    pub fn unreachable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Returns every call received.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn calls(&self) -> Vec<InventoryCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl InventoryService for ScriptedInventoryService {
    async fn register_booking(
        &self,
        hotel_id: &str,
        booking_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<(), InventoryError> {
        self.calls.lock().unwrap().push(InventoryCall {
            hotel_id: hotel_id.to_owned(),
            booking_id,
            check_in,
            check_out,
        });

        if self.unavailable {
            return Err(InventoryError::Unavailable("connection refused".into()));
        }
        match self.reject_with {
            Some(status) => Err(InventoryError::Rejected {
                status,
                body: "Internal Server Error".into(),
            }),
            None => Ok(()),
        }
    }
}

/// A hotel directory answering from a fixed map.
#[derive(Debug, Default)]
pub struct StaticHotelDirectory {
    hotels: HashMap<String, HotelSnapshot>,
}

impl StaticHotelDirectory {
    /// Create an empty directory; every lookup fails.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a hotel.
    #[must_use]
    pub fn with_hotel(mut self, hotel_id: &str, name: &str, city: &str, country: &str) -> Self {
        self.hotels.insert(
            hotel_id.to_owned(),
            HotelSnapshot {
                name: name.to_owned(),
                city: city.to_owned(),
                country: country.to_owned(),
            },
        );
        self
    }
}

#[async_trait]
impl HotelDirectory for StaticHotelDirectory {
    async fn hotel(&self, hotel_id: &str) -> Result<HotelSnapshot, InventoryError> {
        self.hotels
            .get(hotel_id)
            .cloned()
            .ok_or_else(|| InventoryError::Rejected {
                status: 404,
                body: format!("hotel {hotel_id} not found"),
            })
    }
}
