//! Notification consumer entry point.
//!
//! Consumes `BOOKING_CREATED` from `booking.created` and sends the guest a
//! confirmation email.

use std::error::Error;
use std::sync::Arc;

use hotelbook_api::config::NotifierConfig;
use hotelbook_api::error::AppError;
use hotelbook_api::telemetry::Telemetry;
use hotelbook_api::{broker, shutdown};
use hotelbook_broker::{ConsumerRuntime, QueueSpec};
use hotelbook_core::event::BOOKING_CREATED_EVENT_TYPE;
use hotelbook_notifications::{BookingConfirmationHandler, TracingMailer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let telemetry = Telemetry::init("hotelbook-notifier")?;
    tracing::info!("Starting notification consumer");

    let result = run().await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "notification consumer stopped");
    }

    telemetry.shutdown();
    Ok(result?)
}

async fn run() -> Result<(), AppError> {
    let config = NotifierConfig::from_env();
    let broker = broker::connect(&config.rabbitmq_url).await?;

    let handler = BookingConfirmationHandler::new(Arc::new(TracingMailer::new(config.mail_sender)));
    let runtime = ConsumerRuntime::new(
        broker.clone(),
        QueueSpec::created("booking", BOOKING_CREATED_EVENT_TYPE),
        Arc::new(handler),
    );

    let outcome = tokio::select! {
        result = runtime.run() => result,
        () = shutdown::signal() => Ok(()),
    };

    broker.close().await?;
    Ok(outcome?)
}
