//! Coupon and order behaviour against a real database.
//!
//! These tests require:
//! - A running `PostgreSQL` database named by `TEST_DATABASE_URL`
//!
//! Run with: `cargo test -p cartwheel-integration-tests -- --ignored`

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::routing::get;
use axum::{Json, Router};
use cartwheel_core::{DiscountPercent, Email, Price, UserId};
use cartwheel_integration_tests::{TestApp, migrated_pool, request, test_config};
use cartwheel_storefront::db::RepositoryError;
use cartwheel_storefront::db::coupons::CouponRepository;
use cartwheel_storefront::db::products::{ProductInsert, ProductRepository};
use cartwheel_storefront::db::users::UserRepository;
use cartwheel_storefront::models::{Coupon, Product, User};
use cartwheel_storefront::services::checkout::{CheckoutError, CheckoutService};
use cartwheel_storefront::stripe::StripeClient;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use sqlx::PgPool;
use uuid::Uuid;

fn unique(prefix: &str) -> String {
    format!("{prefix}{}", Uuid::new_v4().simple()).to_uppercase()
}

async fn create_user(pool: &PgPool) -> User {
    let email = Email::parse(&format!("{}@example.com", Uuid::new_v4().simple())).unwrap();
    UserRepository::new(pool)
        .create("Test Customer", &email, "not-a-real-hash")
        .await
        .unwrap()
}

async fn create_product(pool: &PgPool, price: Decimal) -> Product {
    ProductRepository::new(pool)
        .create(&ProductInsert {
            name: "Test Lamp",
            description: "Warm light",
            price: Price::new(price).unwrap(),
            image: "",
            category: "test",
        })
        .await
        .unwrap()
}

async fn award(pool: &PgPool, user_id: UserId, code: &str) -> Result<Coupon, RepositoryError> {
    let code = code.to_string();
    CouponRepository::new(pool)
        .replace_for_user(
            user_id,
            move || code.clone(),
            DiscountPercent::new(10).unwrap(),
            Utc::now() + Duration::days(30),
        )
        .await
}

async fn coupon_count(pool: &PgPool, user_id: UserId) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM coupons WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

/// Serve `session` from `GET /v1/checkout/sessions/{id}` and return the base URL.
async fn stub_gateway(session: Value) -> String {
    let app = Router::new().route(
        "/v1/checkout/sessions/{id}",
        get(move || {
            let session = session.clone();
            async move { Json(session) }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/v1")
}

// ============================================================================
// Coupons
// ============================================================================

#[tokio::test]
#[ignore = "Requires a PostgreSQL database (TEST_DATABASE_URL)"]
async fn test_coupon_lookup_is_scoped_to_owner() {
    let pool = migrated_pool().await;
    let owner = create_user(&pool).await;
    let other = create_user(&pool).await;
    let code = unique("GIFT");
    award(&pool, owner.id, &code).await.unwrap();

    let coupons = CouponRepository::new(&pool);
    assert!(coupons.find_active_by_code(&code, owner.id).await.unwrap().is_some());
    assert!(coupons.find_active_by_code(&code, other.id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database (TEST_DATABASE_URL)"]
async fn test_validate_route_hides_another_users_code() {
    let pool = migrated_pool().await;
    let owner = create_user(&pool).await;
    let other = create_user(&pool).await;
    let code = unique("GIFT");
    award(&pool, owner.id, &code).await.unwrap();

    let app = TestApp::with_pool(pool);
    let validate = |user_id: UserId| {
        let access = app.state.tokens().issue_token_pair(user_id).unwrap().access;
        request("POST", "/api/coupon/validate")
            .header(header::COOKIE, format!("accessToken={access}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "code": code }).to_string()))
            .unwrap()
    };

    let foreign = app.send(validate(other.id)).await;
    assert_eq!(foreign.status, StatusCode::NOT_FOUND);
    assert_eq!(foreign.message(), Some("Coupon not found"));

    let own = app.send(validate(owner.id)).await;
    assert_eq!(own.status, StatusCode::OK);
    assert_eq!(own.body["code"], code.as_str());
    assert_eq!(own.body["discountPercentage"], 10);
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database (TEST_DATABASE_URL)"]
async fn test_award_leaves_exactly_one_coupon() {
    let pool = migrated_pool().await;
    let user = create_user(&pool).await;

    award(&pool, user.id, &unique("GIFT")).await.unwrap();
    award(&pool, user.id, &unique("GIFT")).await.unwrap();
    let latest = award(&pool, user.id, &unique("GIFT")).await.unwrap();

    assert_eq!(coupon_count(&pool, user.id).await, 1);
    let active = CouponRepository::new(&pool)
        .find_active_for_user(user.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(active.code, latest.code);
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database (TEST_DATABASE_URL)"]
async fn test_taken_code_is_regenerated() {
    let pool = migrated_pool().await;
    let holder = create_user(&pool).await;
    let user = create_user(&pool).await;
    let taken = unique("GIFT");
    let fresh = unique("GIFT");
    award(&pool, holder.id, &taken).await.unwrap();

    let mut codes = vec![fresh.clone(), taken.clone()];
    let coupon = CouponRepository::new(&pool)
        .replace_for_user(
            user.id,
            move || codes.pop().unwrap(),
            DiscountPercent::new(10).unwrap(),
            Utc::now() + Duration::days(30),
        )
        .await
        .unwrap();

    assert_eq!(coupon.code, fresh);
    let coupons = CouponRepository::new(&pool);
    assert!(coupons.find_active_by_code(&taken, holder.id).await.unwrap().is_some());
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database (TEST_DATABASE_URL)"]
async fn test_failed_award_keeps_previous_coupon() {
    let pool = migrated_pool().await;
    let holder = create_user(&pool).await;
    let user = create_user(&pool).await;
    let taken = unique("GIFT");
    let previous = unique("GIFT");
    award(&pool, holder.id, &taken).await.unwrap();
    award(&pool, user.id, &previous).await.unwrap();

    let err = award(&pool, user.id, &taken).await.unwrap_err();
    assert!(
        matches!(&err, RepositoryError::Conflict(msg) if msg == "coupon code already in use"),
        "unexpected error: {err}"
    );

    let active = CouponRepository::new(&pool)
        .find_active_for_user(user.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(active.code, previous);
}

// ============================================================================
// Checkout confirmation
// ============================================================================

#[tokio::test]
#[ignore = "Requires a PostgreSQL database (TEST_DATABASE_URL)"]
async fn test_paid_confirmation_creates_order_and_redeems_coupon() {
    let pool = migrated_pool().await;
    let buyer = create_user(&pool).await;
    let stranger = create_user(&pool).await;
    let product = create_product(&pool, Decimal::new(10, 0)).await;
    let code = unique("GIFT");
    award(&pool, buyer.id, &code).await.unwrap();

    let session_id = format!("cs_test_{}", Uuid::new_v4().simple());
    let products = json!([{ "id": product.id, "quantity": 2, "price": 10 }]).to_string();
    let api_base = stub_gateway(json!({
        "id": session_id,
        "payment_status": "paid",
        "amount_total": 1800,
        "metadata": {
            "userId": buyer.id.to_string(),
            "couponCode": code,
            "products": products,
        },
    }))
    .await;

    let stripe = StripeClient::with_api_base(&test_config().stripe, &api_base).unwrap();
    let checkout = CheckoutService::new(&pool, &stripe, "http://localhost:5173");

    let order = checkout.confirm(buyer.id, &session_id).await.unwrap();
    assert_eq!(order.user_id, buyer.id);
    assert_eq!(order.products.len(), 1);
    assert_eq!(order.products[0].product_id, product.id);
    assert_eq!(order.products[0].quantity.get(), 2);
    assert_eq!(order.total_amount, Price::from_minor_units(1800));

    let redeemed = CouponRepository::new(&pool)
        .find_active_by_code(&code, buyer.id)
        .await
        .unwrap();
    assert!(redeemed.is_none());

    // Confirming again returns the same order
    let again = checkout.confirm(buyer.id, &session_id).await.unwrap();
    assert_eq!(again.id, order.id);
    let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE stripe_session_id = $1")
        .bind(&session_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(orders, 1);

    // Nobody else can claim it
    assert!(matches!(
        checkout.confirm(stranger.id, &session_id).await,
        Err(CheckoutError::SessionNotFound)
    ));
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database (TEST_DATABASE_URL)"]
async fn test_unpaid_session_creates_no_order() {
    let pool = migrated_pool().await;
    let buyer = create_user(&pool).await;
    let session_id = format!("cs_test_{}", Uuid::new_v4().simple());
    let api_base = stub_gateway(json!({
        "id": session_id,
        "payment_status": "unpaid",
        "metadata": {},
    }))
    .await;

    let stripe = StripeClient::with_api_base(&test_config().stripe, &api_base).unwrap();
    let checkout = CheckoutService::new(&pool, &stripe, "http://localhost:5173");

    assert!(matches!(
        checkout.confirm(buyer.id, &session_id).await,
        Err(CheckoutError::PaymentNotCompleted)
    ));
    let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE stripe_session_id = $1")
        .bind(&session_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(orders, 0);
}
