//! HTTP client for the hotel service.
//!
//! - `POST {base}/hotels/{hotel_id}/bookings` registers a stay.
//! - `GET {base}/api/hotels/{hotel_id}` returns the hotel's display fields.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use hotelbook_core::event::HotelSnapshot;
use hotelbook_core::inventory::{HotelDirectory, InventoryError, InventoryService};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StayDates {
    check_in: NaiveDate,
    check_out: NaiveDate,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterBookingRequest {
    booking_id: Uuid,
    dates: StayDates,
}

#[derive(Debug, Deserialize)]
struct HotelResponse {
    name: String,
    city: String,
    country: String,
}

/// Hotel service client. Every call is bounded by the configured timeout.
#[derive(Debug, Clone)]
pub struct HttpHotelService {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpHotelService {
    /// Creates a client for the service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::InvalidRequest` if `base_url` is not an
    /// absolute URL with a path, and `InventoryError::Unavailable` if the
    /// HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, InventoryError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| InventoryError::InvalidRequest(format!("invalid base url {base_url:?}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(InventoryError::InvalidRequest(format!(
                "base url {base_url} cannot carry a path"
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InventoryError::Unavailable(format!("failed to build client: {e}")))?;
        Ok(Self { client, base_url })
    }

    /// Appends `segments` to the base path, percent-encoding each one, so a
    /// hotel id can never leave its own path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, InventoryError> {
        if let Some(segment) = segments.iter().find(|s| s.is_empty() || matches!(**s, "." | "..")) {
            return Err(InventoryError::InvalidRequest(format!(
                "{segment:?} is not a valid path segment"
            )));
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| InventoryError::InvalidRequest("base url cannot carry a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, InventoryError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        Err(InventoryError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

fn transport_error(e: &reqwest::Error) -> InventoryError {
    if e.is_timeout() {
        InventoryError::Unavailable(format!("request timed out: {e}"))
    } else {
        InventoryError::Unavailable(e.to_string())
    }
}

#[async_trait]
impl InventoryService for HttpHotelService {
    async fn register_booking(
        &self,
        hotel_id: &str,
        booking_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<(), InventoryError> {
        let url = self.endpoint(&["hotels", hotel_id, "bookings"])?;
        debug!(url = %url, booking_id = %booking_id, "registering stay");

        let response = self
            .client
            .post(url)
            .json(&RegisterBookingRequest {
                booking_id,
                dates: StayDates {
                    check_in,
                    check_out,
                },
            })
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        Self::check(response).await.map(|_| ())
    }
}

#[async_trait]
impl HotelDirectory for HttpHotelService {
    async fn hotel(&self, hotel_id: &str) -> Result<HotelSnapshot, InventoryError> {
        let url = self.endpoint(&["api", "hotels", hotel_id])?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;
        let hotel: HotelResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| InventoryError::InvalidResponse(e.to_string()))?;

        Ok(HotelSnapshot {
            name: hotel.name,
            city: hotel.city,
            country: hotel.country,
        })
    }
}
