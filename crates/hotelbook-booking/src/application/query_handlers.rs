//! Query handlers for the booking context.

use hotelbook_core::booking::BookingRecord;
use hotelbook_core::error::DomainError;
use hotelbook_core::repository::BookingRepository;
use uuid::Uuid;

/// Retrieves one booking of `user_id`.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the booking does not exist or belongs
/// to another user, and `DomainError::Infrastructure` if the lookup fails.
pub async fn get_booking(
    user_id: &str,
    booking_id: Uuid,
    repo: &dyn BookingRepository,
) -> Result<BookingRecord, DomainError> {
    repo.find(booking_id)
        .await?
        .filter(|booking| booking.user_id == user_id)
        .ok_or(DomainError::NotFound(booking_id))
}

/// Lists every booking of `user_id`, oldest first.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the lookup fails.
pub async fn list_bookings(
    user_id: &str,
    repo: &dyn BookingRepository,
) -> Result<Vec<BookingRecord>, DomainError> {
    repo.find_by_user(user_id).await
}
