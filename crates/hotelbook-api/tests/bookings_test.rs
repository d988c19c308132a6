//! Integration tests for the bookings endpoints.

mod common;

use axum::http::StatusCode;
use hotelbook_core::event::EventEnvelope;
use hotelbook_test_support::{ScriptedInventoryService, SequentialIdGenerator};
use sqlx::PgPool;

const BOOKINGS: &str = "/api/v1/bookings";

fn as_user(user_id: &str) -> [(&str, &str); 2] {
    [("x-user-id", user_id), ("x-hotel-id", common::HOTEL_ID)]
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_create_booking_returns_201_and_publishes_event(pool: PgPool) {
    // Arrange
    let app = common::build_test_app(pool);

    // Act
    let (status, json) = common::post_json(
        app.router.clone(),
        BOOKINGS,
        &as_user("U1"),
        &common::booking_request(),
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::CREATED);
    let booking_id = SequentialIdGenerator::nth(1);
    assert_eq!(json["booking"]["id"], booking_id.to_string());
    assert_eq!(json["booking"]["status"], "confirmed");
    assert_eq!(json["booking"]["user_id"], "U1");
    assert_eq!(json["booking"]["hotel_id"], "H1");
    assert_eq!(json["event_id"], SequentialIdGenerator::nth(2).to_string());
    assert!(json["notification_error"].is_null());

    let calls = app.inventory.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].booking_id, booking_id);

    let published = app.broker.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].exchange, "domain.events");
    assert_eq!(published[0].routing_key, "booking_created");
    let envelope = EventEnvelope::from_slice(&published[0].payload).unwrap();
    assert_eq!(envelope.event_type(), "BOOKING_CREATED");
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_hotel_service_failure_returns_409_and_cancels_booking(pool: PgPool) {
    // Arrange
    let app = common::build_test_app_with(pool, ScriptedInventoryService::rejecting(500));

    // Act
    let (status, json) = common::post_json(
        app.router.clone(),
        BOOKINGS,
        &as_user("U1"),
        &common::booking_request(),
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "booking_failed");
    assert!(app.broker.published().is_empty());

    let (status, json) =
        common::get_json(app.router, BOOKINGS, &[("x-user-id", "U1")]).await;
    assert_eq!(status, StatusCode::OK);
    let bookings = json.as_array().unwrap();
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0]["status"], "cancelled");
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_publish_failure_still_returns_confirmed_booking(pool: PgPool) {
    let app = common::build_test_app(pool);
    app.broker.set_fail_on_publish(true);

    let (status, json) = common::post_json(
        app.router,
        BOOKINGS,
        &as_user("U1"),
        &common::booking_request(),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["booking"]["status"], "confirmed");
    assert!(json["event_id"].is_null());
    assert!(json["notification_error"].is_string());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_create_booking_without_user_returns_401(pool: PgPool) {
    let app = common::build_test_app(pool);

    let (status, json) = common::post_json(
        app.router,
        BOOKINGS,
        &[("x-hotel-id", common::HOTEL_ID)],
        &common::booking_request(),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "unauthenticated");
    assert!(app.inventory.calls().is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_create_booking_without_hotel_returns_400(pool: PgPool) {
    let app = common::build_test_app(pool);

    let (status, json) = common::post_json(
        app.router,
        BOOKINGS,
        &[("x-user-id", "U1")],
        &common::booking_request(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "missing_header");
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_invalid_dates_return_400_without_calling_hotel_service(pool: PgPool) {
    let app = common::build_test_app(pool);
    let mut body = common::booking_request();
    body["check_out"] = serde_json::json!("2026-02-27");

    let (status, json) =
        common::post_json(app.router, BOOKINGS, &as_user("U1"), &body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
    assert!(app.inventory.calls().is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_bookings_are_scoped_to_their_user(pool: PgPool) {
    // Arrange
    let app = common::build_test_app(pool);
    for user in ["U1", "U2", "U1"] {
        let (status, _) = common::post_json(
            app.router.clone(),
            BOOKINGS,
            &as_user(user),
            &common::booking_request(),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    // Act
    let (list_status, list) =
        common::get_json(app.router.clone(), BOOKINGS, &[("x-user-id", "U1")]).await;
    let first = SequentialIdGenerator::nth(1);
    let uri = format!("{BOOKINGS}/{first}");
    let (own_status, own) =
        common::get_json(app.router.clone(), &uri, &[("x-user-id", "U1")]).await;
    let (foreign_status, foreign) =
        common::get_json(app.router, &uri, &[("x-user-id", "U2")]).await;

    // Assert
    assert_eq!(list_status, StatusCode::OK);
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert!(list.iter().all(|b| b["user_id"] == "U1"));
    assert_eq!(own_status, StatusCode::OK);
    assert_eq!(own["id"], first.to_string());
    assert_eq!(foreign_status, StatusCode::NOT_FOUND);
    assert_eq!(foreign["error"], "booking_not_found");
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_list_bookings_without_user_returns_401(pool: PgPool) {
    let app = common::build_test_app(pool);

    let (status, _) = common::get_json(app.router, BOOKINGS, &[]).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_hotel_id_outside_one_path_segment_returns_400(pool: PgPool) {
    let app = common::build_test_app(pool);

    let (status, json) = common::post_json(
        app.router,
        BOOKINGS,
        &[("x-user-id", "U1"), ("x-hotel-id", "../admin/wipe?x=")],
        &common::booking_request(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
    assert!(app.inventory.calls().is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_values_beyond_store_limits_return_400(pool: PgPool) {
    let app = common::build_test_app(pool);
    let mut long_name = common::booking_request();
    long_name["first_name"] = serde_json::json!("x".repeat(256));
    let mut huge_party = common::booking_request();
    huge_party["adult_count"] = serde_json::json!(u32::MAX);

    for body in [long_name, huge_party] {
        let (status, json) =
            common::post_json(app.router.clone(), BOOKINGS, &as_user("U1"), &body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "validation_error");
    }
    assert!(app.inventory.calls().is_empty());

    let (_, list) = common::get_json(app.router, BOOKINGS, &[("x-user-id", "U1")]).await;
    assert!(list.as_array().unwrap().is_empty());
}
