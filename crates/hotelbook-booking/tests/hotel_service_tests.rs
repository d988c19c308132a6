//! Integration tests for `HttpHotelService` against a local axum stub.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use hotelbook_booking::infrastructure::hotel_service::HttpHotelService;
use hotelbook_core::inventory::{HotelDirectory, InventoryError, InventoryService};
use uuid::Uuid;

type Received = Arc<Mutex<Vec<(String, serde_json::Value)>>>;

/// Serves `router` on an ephemeral port and returns its base URL.
async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{address}")
}

fn stub(status: StatusCode) -> (Router, Received) {
    let received: Received = Arc::default();
    let router = Router::new()
        .route(
            "/hotels/{hotel_id}/bookings",
            post(
                move |State(received): State<Received>,
                      Path(hotel_id): Path<String>,
                      Json(body): Json<serde_json::Value>| async move {
                    received.lock().unwrap().push((hotel_id, body));
                    status
                },
            ),
        )
        .route(
            "/api/hotels/{hotel_id}",
            get(|Path(hotel_id): Path<String>| async move {
                if hotel_id == "H1" {
                    Ok(Json(serde_json::json!({
                        "_id": "H1",
                        "name": "Galle Face",
                        "city": "Colombo",
                        "country": "Sri Lanka",
                        "pricePerNight": 15000
                    })))
                } else {
                    Err(StatusCode::NOT_FOUND)
                }
            }),
        )
        .with_state(received.clone());
    (router, received)
}

fn dates() -> (NaiveDate, NaiveDate) {
    (
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        NaiveDate::from_ymd_opt(2025, 6, 3).unwrap(),
    )
}

#[tokio::test]
async fn test_register_booking_posts_booking_id_and_dates() {
    // Arrange
    let (router, received) = stub(StatusCode::OK);
    let base_url = serve(router).await;
    let service = HttpHotelService::new(&base_url, Duration::from_secs(5)).unwrap();
    let booking_id = Uuid::new_v4();
    let (check_in, check_out) = dates();

    // Act
    service
        .register_booking("H1", booking_id, check_in, check_out)
        .await
        .unwrap();

    // Assert
    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].0, "H1");
    assert_eq!(
        received[0].1,
        serde_json::json!({
            "bookingId": booking_id.to_string(),
            "dates": { "checkIn": "2025-06-01", "checkOut": "2025-06-03" }
        })
    );
}

#[tokio::test]
async fn test_register_booking_maps_server_error_to_rejected() {
    let (router, _received) = stub(StatusCode::INTERNAL_SERVER_ERROR);
    let base_url = serve(router).await;
    let service = HttpHotelService::new(&base_url, Duration::from_secs(5)).unwrap();
    let (check_in, check_out) = dates();

    let result = service
        .register_booking("H1", Uuid::new_v4(), check_in, check_out)
        .await;

    assert!(matches!(result, Err(InventoryError::Rejected { status: 500, .. })));
}

#[tokio::test]
async fn test_register_booking_maps_refused_connection_to_unavailable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);
    let service =
        HttpHotelService::new(&format!("http://{address}"), Duration::from_secs(5)).unwrap();
    let (check_in, check_out) = dates();

    let result = service
        .register_booking("H1", Uuid::new_v4(), check_in, check_out)
        .await;

    assert!(matches!(result, Err(InventoryError::Unavailable(_))));
}

#[tokio::test]
async fn test_hotel_lookup_returns_display_fields() {
    let (router, _received) = stub(StatusCode::OK);
    let base_url = serve(router).await;
    let service = HttpHotelService::new(&format!("{base_url}/"), Duration::from_secs(5)).unwrap();

    let hotel = service.hotel("H1").await.unwrap();
    let missing = service.hotel("H2").await;

    assert_eq!(hotel.name, "Galle Face");
    assert_eq!(hotel.city, "Colombo");
    assert_eq!(hotel.country, "Sri Lanka");
    assert!(matches!(missing, Err(InventoryError::Rejected { status: 404, .. })));
}

#[tokio::test]
async fn test_hotel_id_is_encoded_as_a_single_path_segment() {
    // Arrange
    let (router, received) = stub(StatusCode::OK);
    let base_url = serve(router).await;
    let service = HttpHotelService::new(&base_url, Duration::from_secs(5)).unwrap();
    let (check_in, check_out) = dates();

    // Act
    service
        .register_booking("../admin/wipe?x=", Uuid::new_v4(), check_in, check_out)
        .await
        .unwrap();

    // Assert
    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].0, "../admin/wipe?x=");
}

#[tokio::test]
async fn test_dot_segment_hotel_ids_are_refused_before_sending() {
    let (router, received) = stub(StatusCode::OK);
    let base_url = serve(router).await;
    let service = HttpHotelService::new(&base_url, Duration::from_secs(5)).unwrap();
    let (check_in, check_out) = dates();

    for hotel_id in ["..", ".", ""] {
        let result = service
            .register_booking(hotel_id, Uuid::new_v4(), check_in, check_out)
            .await;
        assert!(
            matches!(result, Err(InventoryError::InvalidRequest(_))),
            "{hotel_id:?}"
        );
    }
    assert!(matches!(
        service.hotel("..").await,
        Err(InventoryError::InvalidRequest(_))
    ));
    assert!(received.lock().unwrap().is_empty());
}

#[test]
fn test_base_url_must_be_absolute() {
    let result = HttpHotelService::new("localhost:7002", Duration::from_secs(5));

    assert!(matches!(result, Err(InventoryError::InvalidRequest(_))));
}
