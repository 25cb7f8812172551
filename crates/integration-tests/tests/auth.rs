//! Session cookie and token refresh behaviour through the full router.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use cartwheel_core::UserId;
use cartwheel_integration_tests::{ACCESS_SECRET, TestApp, cookie_request, json_request};
use jsonwebtoken::{EncodingKey, Header};
use serde_json::json;

#[tokio::test]
async fn test_profile_without_cookie_is_unauthorized() {
    let app = TestApp::new();

    let response = app
        .send(cookie_request("GET", "/api/auth/profile", &[]))
        .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.message(),
        Some("Unauthorized - No access token provided")
    );
}

#[tokio::test]
async fn test_profile_with_garbage_token_is_unauthorized() {
    let app = TestApp::new();

    let response = app
        .send(cookie_request(
            "GET",
            "/api/auth/profile",
            &[("accessToken", "not-a-jwt")],
        ))
        .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.message(), Some("Unauthorized - Invalid access token"));
}

#[tokio::test]
async fn test_profile_with_expired_token_says_expired() {
    let app = TestApp::new();
    let now = chrono::Utc::now().timestamp();
    let expired = jsonwebtoken::encode(
        &Header::default(),
        &json!({ "sub": "42", "iat": now - 3600, "exp": now - 1800 }),
        &EncodingKey::from_secret(ACCESS_SECRET.as_bytes()),
    )
    .unwrap();

    let response = app
        .send(cookie_request(
            "GET",
            "/api/auth/profile",
            &[("accessToken", &expired)],
        ))
        .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.message(), Some("Unauthorized - Access token expired"));
}

#[tokio::test]
async fn test_refresh_without_cookie_is_unauthorized() {
    let app = TestApp::new();

    let response = app
        .send(cookie_request("POST", "/api/auth/refresh-token", &[]))
        .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.message(), Some("No refresh token provided"));
}

#[tokio::test]
async fn test_refresh_issues_access_cookie_and_keeps_refresh_token() {
    let app = TestApp::new();
    let tokens = app.state.tokens();
    let user_id = UserId::new(42);

    let pair = tokens.issue_token_pair(user_id).unwrap();
    tokens.persist_refresh(user_id, &pair.refresh).await.unwrap();

    let response = app
        .send(cookie_request(
            "POST",
            "/api/auth/refresh-token",
            &[("refreshToken", &pair.refresh)],
        ))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.message(), Some("Token refreshed successfully"));

    let access_cookie = response.set_cookie("accessToken").unwrap();
    assert!(access_cookie.contains("HttpOnly"));
    assert!(access_cookie.contains("SameSite=Strict"));
    assert!(access_cookie.contains("Max-Age=900"));
    assert!(response.set_cookie("refreshToken").is_none());

    // The new access token verifies for the same user
    let access = access_cookie
        .trim_start_matches("accessToken=")
        .split(';')
        .next()
        .unwrap();
    let claims = tokens.verify_access(access).unwrap();
    assert_eq!(claims.user_id().unwrap(), user_id);

    // The stored refresh token still works
    let again = app
        .send(cookie_request(
            "POST",
            "/api/auth/refresh-token",
            &[("refreshToken", &pair.refresh)],
        ))
        .await;
    assert_eq!(again.status, StatusCode::OK);
}

#[tokio::test]
async fn test_superseded_refresh_token_is_rejected() {
    let app = TestApp::new();
    let tokens = app.state.tokens();
    let user_id = UserId::new(7);

    let first = tokens.issue_token_pair(user_id).unwrap();
    tokens.persist_refresh(user_id, &first.refresh).await.unwrap();
    let second = tokens.issue_token_pair(user_id).unwrap();
    tokens.persist_refresh(user_id, &second.refresh).await.unwrap();

    let response = app
        .send(cookie_request(
            "POST",
            "/api/auth/refresh-token",
            &[("refreshToken", &first.refresh)],
        ))
        .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.message(), Some("Invalid refresh token"));
}

#[tokio::test]
async fn test_logout_revokes_and_clears_cookies() {
    let app = TestApp::new();
    let tokens = app.state.tokens();
    let user_id = UserId::new(9);

    let pair = tokens.issue_token_pair(user_id).unwrap();
    tokens.persist_refresh(user_id, &pair.refresh).await.unwrap();

    let response = app
        .send(cookie_request(
            "POST",
            "/api/auth/logout",
            &[("accessToken", &pair.access), ("refreshToken", &pair.refresh)],
        ))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.message(), Some("Logged out successfully"));
    assert!(response.set_cookie("accessToken").unwrap().contains("Max-Age=0"));
    assert!(response.set_cookie("refreshToken").unwrap().contains("Max-Age=0"));

    let refresh = app
        .send(cookie_request(
            "POST",
            "/api/auth/refresh-token",
            &[("refreshToken", &pair.refresh)],
        ))
        .await;
    assert_eq!(refresh.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_without_session_still_succeeds() {
    let app = TestApp::new();

    let response = app
        .send(cookie_request("POST", "/api/auth/logout", &[]))
        .await;

    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_malformed_login_body_is_bad_request() {
    let app = TestApp::new();

    let response = app
        .send(json_request("POST", "/api/auth/login", "{\"email\": "))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.message().is_some());
}

#[tokio::test]
async fn test_login_is_rate_limited_with_json_body() {
    let app = TestApp::new();

    for _ in 0..5 {
        let response = app
            .send(json_request("POST", "/api/auth/login", "{\"email\": "))
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
    }

    let limited = app
        .send(json_request("POST", "/api/auth/login", "{\"email\": "))
        .await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        limited.message(),
        Some("Too many requests, please try again later")
    );
}

#[tokio::test]
async fn test_repeated_valid_refreshes_are_not_limited() {
    let app = TestApp::new();
    let tokens = app.state.tokens();
    let user_id = UserId::new(11);

    let pair = tokens.issue_token_pair(user_id).unwrap();
    tokens.persist_refresh(user_id, &pair.refresh).await.unwrap();

    for attempt in 0..20 {
        let response = app
            .send(cookie_request(
                "POST",
                "/api/auth/refresh-token",
                &[("refreshToken", &pair.refresh)],
            ))
            .await;
        assert_eq!(response.status, StatusCode::OK, "refresh #{attempt}");
    }
}

#[tokio::test]
async fn test_exhausted_login_limit_leaves_refresh_usable() {
    let app = TestApp::new();
    let tokens = app.state.tokens();
    let user_id = UserId::new(12);

    let pair = tokens.issue_token_pair(user_id).unwrap();
    tokens.persist_refresh(user_id, &pair.refresh).await.unwrap();

    for _ in 0..6 {
        app.send(json_request("POST", "/api/auth/login", "{}")).await;
    }
    let limited = app
        .send(json_request("POST", "/api/auth/login", "{}"))
        .await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);

    let refresh = app
        .send(cookie_request(
            "POST",
            "/api/auth/refresh-token",
            &[("refreshToken", &pair.refresh)],
        ))
        .await;
    assert_eq!(refresh.status, StatusCode::OK);

    let profile = app
        .send(cookie_request(
            "GET",
            "/api/auth/profile",
            &[("accessToken", &pair.access)],
        ))
        .await;
    assert_ne!(profile.status, StatusCode::TOO_MANY_REQUESTS);
}
