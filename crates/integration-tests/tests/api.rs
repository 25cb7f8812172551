//! Routing, health checks and access control through the full router.

#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{StatusCode, header};
use cartwheel_integration_tests::{TestApp, cookie_request, json_request, request};

#[tokio::test]
async fn test_health_returns_ok() {
    let app = TestApp::new();

    let response = app.send(cookie_request("GET", "/health", &[])).await;

    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_readiness_reports_unavailable_database() {
    let app = TestApp::new();

    let response = app.send(cookie_request("GET", "/health/ready", &[])).await;

    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = TestApp::new();

    let response = app
        .send(
            request("GET", "/health")
                .header("x-request-id", "req-abc.123")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(
        response.headers.get("x-request-id").unwrap(),
        "req-abc.123"
    );
}

#[tokio::test]
async fn test_generated_request_id_when_absent() {
    let app = TestApp::new();

    let response = app.send(cookie_request("GET", "/health", &[])).await;

    let id = response.headers.get("x-request-id").unwrap().to_str().unwrap();
    assert!(!id.is_empty());
}

#[tokio::test]
async fn test_admin_routes_require_authentication() {
    let app = TestApp::new();

    for (method, uri) in [
        ("GET", "/api/products"),
        ("PATCH", "/api/products/1"),
        ("DELETE", "/api/products/1"),
        ("GET", "/api/analytics"),
    ] {
        let response = app.send(cookie_request(method, uri, &[])).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED, "{method} {uri}");
        assert_eq!(
            response.message(),
            Some("Unauthorized - No access token provided"),
            "{method} {uri}"
        );
    }
}

#[tokio::test]
async fn test_customer_routes_require_authentication() {
    let app = TestApp::new();

    for (method, uri) in [
        ("GET", "/api/cart"),
        ("DELETE", "/api/cart"),
        ("GET", "/api/coupon"),
    ] {
        let response = app.send(cookie_request(method, uri, &[])).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED, "{method} {uri}");
    }

    let response = app
        .send(json_request(
            "POST",
            "/api/payments/checkout-session",
            r#"{"products": []}"#,
        ))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = TestApp::new();

    let response = app.send(cookie_request("GET", "/api/nope", &[])).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cors_allows_client_origin_with_credentials() {
    let app = TestApp::new();

    let response = app
        .send(
            request("OPTIONS", "/api/products/featured")
                .header(header::ORIGIN, "http://localhost:5173")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(
        response
            .headers
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "http://localhost:5173"
    );
    assert_eq!(
        response
            .headers
            .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
            .unwrap(),
        "true"
    );
}
