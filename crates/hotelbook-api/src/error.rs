//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hotelbook_booking::application::saga::SagaError;
use hotelbook_broker::BrokerError;
use hotelbook_core::error::DomainError;
use hotelbook_core::inventory::InventoryError;
use serde::Serialize;
use thiserror::Error;

/// Startup and runtime errors for the service binaries.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failure.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Message broker connection failure.
    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    /// The hotel service client could not be built.
    #[error("hotel service error: {0}")]
    Inventory(#[from] InventoryError),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),

    /// Tracing or exporter setup failure.
    #[error("telemetry error: {0}")]
    Telemetry(String),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// HTTP-layer error that implements `IntoResponse`.
#[derive(Debug)]
pub enum ApiError {
    /// A domain failure from a query or repository.
    Domain(DomainError),
    /// A failed booking saga run.
    Saga(SagaError),
    /// The caller did not identify itself.
    Unauthenticated,
    /// A required request header is missing or empty.
    MissingHeader(&'static str),
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self::Domain(err)
    }
}

impl From<SagaError> for ApiError {
    fn from(err: SagaError) -> Self {
        Self::Saga(err)
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Domain(DomainError::NotFound(_)) => (StatusCode::NOT_FOUND, "booking_not_found"),
            Self::Domain(DomainError::InvalidTransition { .. }) => {
                (StatusCode::CONFLICT, "invalid_transition")
            }
            Self::Domain(DomainError::Validation(_)) | Self::Saga(SagaError::Validation(_)) => {
                (StatusCode::BAD_REQUEST, "validation_error")
            }
            Self::Domain(DomainError::Infrastructure(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "infrastructure_error")
            }
            Self::Saga(SagaError::Compensated { .. }) => (StatusCode::CONFLICT, "booking_failed"),
            Self::Saga(SagaError::Persistence(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "persistence_error")
            }
            Self::Saga(SagaError::CompensationFailed { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "compensation_failed")
            }
            Self::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            Self::MissingHeader(_) => (StatusCode::BAD_REQUEST, "missing_header"),
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Domain(err) => err.to_string(),
            Self::Saga(err) => err.to_string(),
            Self::Unauthenticated => "missing x-user-id header".to_string(),
            Self::MissingHeader(name) => format!("missing {name} header"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();
        let body = ErrorBody {
            error: error_code,
            message: self.message(),
        };

        (status, Json(body)).into_response()
    }
}
