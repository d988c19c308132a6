//! `PostgreSQL` implementation of the `BookingRepository` trait.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use hotelbook_core::booking::{BookingRecord, BookingStatus};
use hotelbook_core::error::DomainError;
use hotelbook_core::repository::BookingRepository;

use crate::schema::BOOKING_COLUMNS;

/// PostgreSQL-backed booking repository.
#[derive(Debug, Clone)]
pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    /// Creates a new `PgBookingRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    user_id: String,
    hotel_id: String,
    first_name: String,
    last_name: String,
    email: String,
    adult_count: i32,
    child_count: i32,
    check_in: NaiveDate,
    check_out: NaiveDate,
    total_cost: f64,
    payment_intent_id: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for BookingRecord {
    type Error = DomainError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let count = |value: i32, column: &str| {
            u32::try_from(value).map_err(|_| {
                DomainError::Infrastructure(format!("negative {column} on booking {}", row.id))
            })
        };
        Ok(Self {
            adult_count: count(row.adult_count, "adult_count")?,
            child_count: count(row.child_count, "child_count")?,
            status: row.status.parse()?,
            id: row.id,
            user_id: row.user_id,
            hotel_id: row.hotel_id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            check_in: row.check_in,
            check_out: row.check_out,
            total_cost: row.total_cost,
            payment_intent_id: row.payment_intent_id,
            created_at: row.created_at,
        })
    }
}

fn db_error(e: &sqlx::Error) -> DomainError {
    DomainError::Infrastructure(format!("database error: {e}"))
}

fn count_param(value: u32) -> Result<i32, DomainError> {
    i32::try_from(value)
        .map_err(|_| DomainError::Validation(format!("occupancy count {value} is out of range")))
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn insert(&self, record: &BookingRecord) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO bookings (id, user_id, hotel_id, first_name, last_name, email, \
             adult_count, child_count, check_in, check_out, total_cost, payment_intent_id, \
             status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(record.id)
        .bind(&record.user_id)
        .bind(&record.hotel_id)
        .bind(&record.first_name)
        .bind(&record.last_name)
        .bind(&record.email)
        .bind(count_param(record.adult_count)?)
        .bind(count_param(record.child_count)?)
        .bind(record.check_in)
        .bind(record.check_out)
        .bind(record.total_cost)
        .bind(&record.payment_intent_id)
        .bind(record.status.as_str())
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error(&e))?;

        debug!(booking_id = %record.id, status = %record.status, "inserted booking");
        Ok(())
    }

    async fn transition(
        &self,
        booking_id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<(), DomainError> {
        if !from.can_transition_to(to) {
            return Err(DomainError::InvalidTransition {
                booking_id,
                from,
                to,
            });
        }

        let updated = sqlx::query("UPDATE bookings SET status = $3 WHERE id = $1 AND status = $2")
            .bind(booking_id)
            .bind(from.as_str())
            .bind(to.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error(&e))?;

        if updated.rows_affected() == 1 {
            debug!(booking_id = %booking_id, from = %from, to = %to, "booking status changed");
            return Ok(());
        }

        let current: Option<String> = sqlx::query_scalar("SELECT status FROM bookings WHERE id = $1")
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error(&e))?;

        match current {
            None => Err(DomainError::NotFound(booking_id)),
            Some(status) => Err(DomainError::InvalidTransition {
                booking_id,
                from: status.parse()?,
                to,
            }),
        }
    }

    async fn find(&self, booking_id: Uuid) -> Result<Option<BookingRecord>, DomainError> {
        let row: Option<BookingRow> =
            sqlx::query_as(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"))
                .bind(booking_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error(&e))?;

        row.map(BookingRecord::try_from).transpose()
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<BookingRecord>, DomainError> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE user_id = $1 ORDER BY created_at, id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error(&e))?;

        rows.into_iter().map(BookingRecord::try_from).collect()
    }
}
