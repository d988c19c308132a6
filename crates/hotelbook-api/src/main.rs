//! Booking service entry point.

use std::error::Error;
use std::sync::Arc;

use axum::Router;
use hotelbook_api::config::Config;
use hotelbook_api::error::AppError;
use hotelbook_api::state::AppState;
use hotelbook_api::telemetry::Telemetry;
use hotelbook_api::{broker, cors, routes, shutdown};
use hotelbook_booking::application::saga::CreateBookingSaga;
use hotelbook_booking::infrastructure::hotel_service::HttpHotelService;
use hotelbook_booking_store::pg_booking_repository::PgBookingRepository;
use hotelbook_booking_store::schema::MIGRATOR;
use hotelbook_broker::BookingEventPublisher;
use hotelbook_core::clock::SystemClock;
use hotelbook_core::id::RandomIdGenerator;
use sqlx::postgres::PgPoolOptions;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let telemetry = Telemetry::init("hotelbook-api")?;
    tracing::info!("Starting booking service");

    let result = run().await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "booking service stopped");
    }

    telemetry.shutdown();
    Ok(result?)
}

async fn run() -> Result<(), AppError> {
    let config = Config::from_env()?;

    // Create database connection pool and bring the schema up to date.
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    MIGRATOR.run(&pool).await?;

    let broker = broker::connect(&config.rabbitmq_url).await?;
    let hotel_service = Arc::new(HttpHotelService::new(
        &config.hotel_service_url,
        config.inventory_timeout,
    )?);
    let repository = Arc::new(PgBookingRepository::new(pool));
    let clock = Arc::new(SystemClock);
    let ids = Arc::new(RandomIdGenerator);

    let mut saga = CreateBookingSaga::new(
        repository.clone(),
        hotel_service.clone(),
        hotel_service,
        clock.clone(),
        ids.clone(),
    );
    if config.publish_booking_events {
        saga = saga.with_publisher(BookingEventPublisher::new(broker.clone(), clock, ids));
    } else {
        tracing::info!("booking event publishing disabled");
    }

    let app_state = AppState::new(repository, saga, broker.clone());

    let app = Router::new()
        .merge(routes::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors::layer(&config.cors_allowed_origins)?)
        .with_state(app_state);

    let addr = config.socket_addr()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::signal())
        .await?;

    broker.close().await?;
    Ok(())
}
