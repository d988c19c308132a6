//! Process configuration, read once at startup from the environment.

use std::net::SocketAddr;
use std::time::Duration;

use hotelbook_notifications::mailer::DEFAULT_SENDER;

use crate::error::AppError;

/// Broker URL used when `RABBITMQ_URL` is not set.
pub const DEFAULT_RABBITMQ_URL: &str = "amqp://localhost:5672";

/// Hotel service URL used when `HOTEL_SERVICE_URL` is not set.
pub const DEFAULT_HOTEL_SERVICE_URL: &str = "http://localhost:7002";

/// Booking service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// `PostgreSQL` connection string.
    pub database_url: String,
    /// Listen host.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Message broker URL; `memory://` selects the in-process broker.
    pub rabbitmq_url: String,
    /// Base URL of the hotel service.
    pub hotel_service_url: String,
    /// Whether confirmed bookings are announced on the broker.
    pub publish_booking_events: bool,
    /// Upper bound of each hotel service call.
    pub inventory_timeout: Duration,
    /// Origins allowed to call the API from a browser; `*` allows any.
    pub cors_allowed_origins: Vec<String>,
}

impl Config {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is missing or a value
    /// cannot be parsed.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let database_url = lookup("DATABASE_URL").ok_or_else(|| {
            AppError::Config("DATABASE_URL environment variable must be set".into())
        })?;
        let port = match lookup("PORT") {
            Some(port) => port
                .parse()
                .map_err(|e| AppError::Config(format!("PORT must be a valid u16: {e}")))?,
            None => 7004,
        };
        let publish_booking_events = match lookup("PUBLISH_BOOKING_EVENTS") {
            Some(flag) => parse_flag("PUBLISH_BOOKING_EVENTS", &flag)?,
            None => true,
        };
        let inventory_timeout = match lookup("INVENTORY_TIMEOUT_SECS") {
            Some(secs) => Duration::from_secs(secs.parse().map_err(|e| {
                AppError::Config(format!("INVENTORY_TIMEOUT_SECS must be whole seconds: {e}"))
            })?),
            None => Duration::from_secs(10),
        };

        Ok(Self {
            database_url,
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            rabbitmq_url: lookup("RABBITMQ_URL").unwrap_or_else(|| DEFAULT_RABBITMQ_URL.to_string()),
            hotel_service_url: lookup("HOTEL_SERVICE_URL")
                .unwrap_or_else(|| DEFAULT_HOTEL_SERVICE_URL.to_string()),
            publish_booking_events,
            inventory_timeout,
            cors_allowed_origins: lookup("CORS_ALLOWED_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(str::trim)
                        .filter(|origin| !origin.is_empty())
                        .map(str::to_owned)
                        .collect()
                })
                .unwrap_or_default(),
        })
    }

    /// The address to listen on.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `HOST:PORT` is not a socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))
    }
}

/// Notification consumer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifierConfig {
    /// Message broker URL.
    pub rabbitmq_url: String,
    /// Sender of confirmation emails.
    pub mail_sender: String,
}

impl NotifierConfig {
    /// Reads the configuration from process environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            rabbitmq_url: lookup("RABBITMQ_URL").unwrap_or_else(|| DEFAULT_RABBITMQ_URL.to_string()),
            mail_sender: lookup("MAIL_FROM").unwrap_or_else(|| DEFAULT_SENDER.to_string()),
        }
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, AppError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(AppError::Config(format!("{key} must be a boolean, got {other:?}"))),
    }
}
