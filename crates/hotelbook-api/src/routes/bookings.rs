//! Routes for creating and reading bookings.
//!
//! Callers identify themselves with `x-user-id`; the hotel is chosen with
//! `x-hotel-id` on creation.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use hotelbook_booking::application::query_handlers;
use hotelbook_booking::domain::commands::CreateBooking;
use hotelbook_core::booking::{BookingRecord, NewBooking};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

const USER_HEADER: &str = "x-user-id";
const HOTEL_HEADER: &str = "x-hotel-id";

/// Request body for POST /api/v1/bookings.
#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    /// Guest first name.
    pub first_name: String,
    /// Guest last name.
    pub last_name: String,
    /// Address the confirmation is sent to.
    pub email: String,
    /// Number of adults.
    pub adult_count: u32,
    /// Number of children.
    #[serde(default)]
    pub child_count: u32,
    /// First night.
    pub check_in: NaiveDate,
    /// Departure day.
    pub check_out: NaiveDate,
    /// Amount charged.
    pub total_cost: f64,
    /// Payment reference.
    pub payment_intent_id: String,
}

/// Response body returned after a booking is confirmed.
#[derive(Debug, Serialize)]
pub struct CreateBookingResponse {
    /// The confirmed booking.
    pub booking: BookingRecord,
    /// Id of the published `BOOKING_CREATED` event, if any.
    pub event_id: Option<Uuid>,
    /// Why no event was published, if publishing failed.
    pub notification_error: Option<String>,
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

fn user_id(headers: &HeaderMap) -> Result<String, ApiError> {
    header(headers, USER_HEADER).ok_or(ApiError::Unauthenticated)
}

/// POST /api/v1/bookings
#[instrument(skip_all)]
async fn create_booking(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<CreateBookingResponse>), ApiError> {
    let user_id = user_id(&headers)?;
    let hotel_id = header(&headers, HOTEL_HEADER).ok_or(ApiError::MissingHeader(HOTEL_HEADER))?;

    let command = CreateBooking {
        correlation_id: Uuid::new_v4(),
        booking: NewBooking {
            user_id,
            hotel_id,
            first_name: request.first_name,
            last_name: request.last_name,
            email: request.email,
            adult_count: request.adult_count,
            child_count: request.child_count,
            check_in: request.check_in,
            check_out: request.check_out,
            total_cost: request.total_cost,
            payment_intent_id: request.payment_intent_id,
        },
    };

    info!(correlation_id = %command.correlation_id, "handling create_booking command");

    let outcome = state.saga.execute(command).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateBookingResponse {
            booking: outcome.booking,
            event_id: outcome.event.map(|event| event.id),
            notification_error: outcome.notification_error,
        }),
    ))
}

/// GET /api/v1/bookings
async fn list_bookings(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<BookingRecord>>, ApiError> {
    let user_id = user_id(&headers)?;
    let bookings = query_handlers::list_bookings(&user_id, &*state.repository).await?;
    Ok(Json(bookings))
}

/// GET /api/v1/bookings/{booking_id}
async fn get_booking(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingRecord>, ApiError> {
    let user_id = user_id(&headers)?;
    let booking = query_handlers::get_booking(&user_id, booking_id, &*state.repository).await?;
    Ok(Json(booking))
}

/// Returns the bookings router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/bookings", get(list_bookings).post(create_booking))
        .route("/api/v1/bookings/{booking_id}", get(get_booking))
}
