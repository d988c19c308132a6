//! HTTP routes.

use axum::Router;

use crate::state::AppState;

pub mod bookings;
pub mod health;

/// Returns every route of the booking service.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(bookings::router())
}
