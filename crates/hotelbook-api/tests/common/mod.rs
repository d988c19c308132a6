//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use hotelbook_booking::application::saga::CreateBookingSaga;
use hotelbook_booking_store::pg_booking_repository::PgBookingRepository;
use hotelbook_broker::{BookingEventPublisher, InMemoryBroker};
use hotelbook_core::clock::Clock;
use hotelbook_core::id::IdGenerator;
use hotelbook_test_support::{
    FixedClock, ScriptedInventoryService, SequentialIdGenerator, StaticHotelDirectory,
};
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use hotelbook_api::routes;
use hotelbook_api::state::AppState;

/// Hotel known to the test directory.
pub const HOTEL_ID: &str = "H1";

/// Fixed timestamp used across all integration tests.
fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(
        chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 1, 15, 10, 0, 0).unwrap(),
    ))
}

/// Collaborators a test can inspect after driving the app.
pub struct TestApp {
    pub router: Router,
    pub broker: InMemoryBroker,
    pub inventory: Arc<ScriptedInventoryService>,
}

/// Build the full app router with a real `PgBookingRepository`, an accepting
/// hotel service and an in-process broker.
pub fn build_test_app(pool: PgPool) -> TestApp {
    build_test_app_with(pool, ScriptedInventoryService::accepting())
}

/// Build the full app router with a custom hotel service. Ids come from a
/// `SequentialIdGenerator`, so the first booking is `nth(1)` and its event
/// `nth(2)`.
pub fn build_test_app_with(pool: PgPool, inventory: ScriptedInventoryService) -> TestApp {
    let clock = fixed_clock();
    let ids: Arc<dyn IdGenerator> = Arc::new(SequentialIdGenerator::new());
    let broker = InMemoryBroker::new();
    let inventory = Arc::new(inventory);
    let hotels = Arc::new(StaticHotelDirectory::new().with_hotel(
        HOTEL_ID,
        "Galle Face",
        "Colombo",
        "Sri Lanka",
    ));
    let repository = Arc::new(PgBookingRepository::new(pool));

    let saga = CreateBookingSaga::new(
        repository.clone(),
        inventory.clone(),
        hotels,
        clock.clone(),
        ids.clone(),
    )
    .with_publisher(BookingEventPublisher::new(
        Arc::new(broker.clone()),
        clock,
        ids,
    ));
    let app_state = AppState::new(repository, saga, Arc::new(broker.clone()));

    TestApp {
        router: Router::new().merge(routes::router()).with_state(app_state),
        broker,
        inventory,
    }
}

/// A valid booking request body.
pub fn booking_request() -> serde_json::Value {
    serde_json::json!({
        "first_name": "Ada",
        "last_name": "Lovelace",
        "email": "ada@example.com",
        "adult_count": 2,
        "child_count": 1,
        "check_in": "2026-03-01",
        "check_out": "2026-03-04",
        "total_cost": 45000.0,
        "payment_intent_id": "pi_123"
    })
}

/// Send a POST request with a JSON body and the given headers and return the
/// response.
pub async fn post_json(
    app: Router,
    uri: &str,
    headers: &[(&str, &str)],
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let mut request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    let request = request
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    send(app, request).await
}

/// Send a GET request with the given headers and return the response.
pub async fn get_json(
    app: Router,
    uri: &str,
    headers: &[(&str, &str)],
) -> (StatusCode, serde_json::Value) {
    let mut request = Request::builder().method("GET").uri(uri);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    let request = request.body(Body::empty()).unwrap();

    send(app, request).await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}
