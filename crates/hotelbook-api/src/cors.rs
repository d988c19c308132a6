//! Cross-origin policy of the booking API.

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::error::AppError;

/// Builds the CORS layer for `allowed_origins`. A single `*` allows any
/// origin.
///
/// # Errors
///
/// Returns `AppError::Config` if an origin is not a valid header value.
pub fn layer(allowed_origins: &[String]) -> Result<CorsLayer, AppError> {
    if allowed_origins.iter().any(|origin| origin == "*") {
        return Ok(CorsLayer::permissive());
    }

    let origins = allowed_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|e| AppError::Config(format!("invalid CORS origin {origin:?}: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static("x-user-id"),
            HeaderName::from_static("x-hotel-id"),
        ]))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN};
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    use super::*;

    async fn allowed_origin(layer: CorsLayer, origin: &str) -> Option<String> {
        let app = Router::new()
            .route("/health", get(|| async { StatusCode::OK }))
            .layer(layer);
        let request = Request::builder()
            .uri("/health")
            .header(ORIGIN, origin)
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        response
            .headers()
            .get(ACCESS_CONTROL_ALLOW_ORIGIN)
            .map(|value| value.to_str().unwrap().to_owned())
    }

    #[tokio::test]
    async fn test_listed_origin_is_allowed_and_others_are_not() {
        // Arrange
        let origins = vec!["https://book.example.com".to_string()];

        // Act
        let listed = allowed_origin(layer(&origins).unwrap(), "https://book.example.com").await;
        let other = allowed_origin(layer(&origins).unwrap(), "https://evil.example.com").await;

        // Assert
        assert_eq!(listed.as_deref(), Some("https://book.example.com"));
        assert_eq!(other, None);
    }

    #[tokio::test]
    async fn test_wildcard_allows_any_origin() {
        let origin = allowed_origin(layer(&["*".to_string()]).unwrap(), "https://a.example").await;

        assert_eq!(origin.as_deref(), Some("*"));
    }

    #[test]
    fn test_invalid_origin_is_a_config_error() {
        let result = layer(&["https://bad\norigin".to_string()]);

        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
