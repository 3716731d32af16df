//! CORS middleware configuration.

use axum::http::header::{
    ACCEPT, ACCEPT_RANGES, AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_RANGE,
    CONTENT_TYPE, RANGE,
};
use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};

use crate::web::handlers::ACCESS_PASSWORD_HEADER;

/// Create a CORS layer from configuration.
///
/// Delivery headers are exposed so browser clients can read ranges and
/// download names.
pub fn create_cors_layer(origins: &[String]) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::PATCH,
        Method::OPTIONS,
    ];
    let exposed = [CONTENT_DISPOSITION, CONTENT_RANGE, ACCEPT_RANGES, CONTENT_LENGTH];

    let parsed_origins: Vec<HeaderValue> =
        origins.iter().filter_map(|o| o.parse().ok()).collect();

    // No (valid) origins configured: development mode, any origin, no credentials
    if parsed_origins.is_empty() {
        return CorsLayer::new()
            .allow_methods(methods)
            .allow_headers(Any)
            .expose_headers(exposed)
            .allow_origin(Any);
    }

    CorsLayer::new()
        .allow_methods(methods)
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            ACCEPT,
            RANGE,
            HeaderName::from_static(ACCESS_PASSWORD_HEADER),
        ])
        .expose_headers(exposed)
        .allow_credentials(true)
        .allow_origin(parsed_origins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get, Router};
    use tower::util::ServiceExt;

    async fn ok() -> &'static str {
        "OK"
    }

    #[tokio::test]
    async fn test_dev_mode_allows_any_origin() {
        let app = Router::new()
            .route("/", get(ok))
            .layer(create_cors_layer(&[]));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("Origin", "http://example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "*"
        );
        let exposed = response.headers()["access-control-expose-headers"]
            .to_str()
            .unwrap()
            .to_ascii_lowercase();
        assert!(exposed.contains("content-range"));
    }

    #[tokio::test]
    async fn test_configured_origins() {
        let origins = vec!["http://localhost:5173".to_string()];
        let app = Router::new()
            .route("/", get(ok))
            .layer(create_cors_layer(&origins));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("Origin", "http://localhost:5173")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "http://localhost:5173"
        );
        assert_eq!(
            response.headers()["access-control-allow-credentials"],
            "true"
        );
    }
}
