//! Booking store database schema.

/// Migrations applied at startup, embedded from the workspace `migrations/`
/// directory.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

/// Columns selected for a full `BookingRecord`.
pub(crate) const BOOKING_COLUMNS: &str = "id, user_id, hotel_id, first_name, last_name, email, \
     adult_count, child_count, check_in, check_out, total_cost, payment_intent_id, status, \
     created_at";
