//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use api::AppState;
use api::config::Config;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::UserId;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use store::InMemoryStore;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn test_config() -> Config {
    Config {
        jwt_secret: "test-secret".to_string(),
        ..Config::default()
    }
}

fn setup() -> (Router, InMemoryStore) {
    let store = InMemoryStore::new();
    let state = Arc::new(AppState::new(store.clone(), &test_config()));
    (api::create_app(state, get_metrics_handle()), store)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn register(app: &Router, email: &str) -> UserId {
    let (status, json) = send(
        app,
        "POST",
        "/api/v1/users/register",
        None,
        Some(json!({ "email": email, "password": "hunter22" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    UserId::parse_str(json["user_id"].as_str().unwrap()).unwrap()
}

async fn login(app: &Router, email: &str) -> String {
    let (status, json) = send(
        app,
        "POST",
        "/api/v1/users/login",
        None,
        Some(json!({ "email": email, "password": "hunter22" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    json["token"].as_str().unwrap().to_string()
}

async fn customer_token(app: &Router, email: &str) -> String {
    register(app, email).await;
    login(app, email).await
}

async fn admin_token(app: &Router, store: &InMemoryStore) -> String {
    let user_id = register(app, "admin@example.com").await;
    assert!(store.promote_to_admin(user_id).await);
    login(app, "admin@example.com").await
}

async fn create_product(app: &Router, admin: &str, name: &str, price: i64, stock: i32) -> String {
    let (status, json) = send(
        app,
        "POST",
        "/api/v1/products",
        Some(admin),
        Some(json!({ "name": name, "price": price, "stock_quantity": stock })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    json["product_id"].as_str().unwrap().to_string()
}

async fn add_to_cart(app: &Router, token: &str, product_id: &str, quantity: i32) -> StatusCode {
    send(
        app,
        "POST",
        "/api/v1/cart",
        Some(token),
        Some(json!({ "product_id": product_id, "quantity": quantity })),
    )
    .await
    .0
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();

    let (status, json) = send(&app, "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_register_normalizes_and_rejects_duplicates() {
    let (app, _) = setup();
    register(&app, "  Buyer@Example.com ").await;

    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/users/register",
        None,
        Some(json!({ "email": "buyer@example.com", "password": "other" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "Email already in use");

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/users/register",
        None,
        Some(json!({ "email": " ", "password": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_rejects_bad_password() {
    let (app, _) = setup();
    register(&app, "buyer@example.com").await;

    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/users/login",
        None,
        Some(json!({ "email": "buyer@example.com", "password": "wrong" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "Invalid email or password");
}

#[tokio::test]
async fn test_protected_routes_need_token() {
    let (app, _) = setup();

    let (status, _) = send(&app, "GET", "/api/v1/cart", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/api/v1/cart", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_product_writes_need_admin() {
    let (app, store) = setup();
    let customer = customer_token(&app, "buyer@example.com").await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/products",
        Some(&customer),
        Some(json!({ "name": "Poster", "price": 2000, "stock_quantity": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = admin_token(&app, &store).await;
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/products",
        Some(&admin),
        Some(json!({ "name": "  ", "price": 2000, "stock_quantity": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let product_id = create_product(&app, &admin, "Poster", 2000, 5).await;
    let (status, json) = send(
        &app,
        "GET",
        &format!("/api/v1/products/{product_id}"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "Poster");
    assert_eq!(json["price"], 2000);
}

#[tokio::test]
async fn test_product_price_is_bounded() {
    let (app, store) = setup();
    let admin = admin_token(&app, &store).await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/products",
        Some(&admin),
        Some(json!({ "name": "Vault", "price": i64::MAX, "stock_quantity": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    create_product(&app, &admin, "Yacht", api::routes::products::MAX_PRICE_CENTS, 1).await;
}

#[tokio::test]
async fn test_huge_page_number_falls_back_to_first_page() {
    let (app, store) = setup();
    let admin = admin_token(&app, &store).await;
    create_product(&app, &admin, "Poster", 2000, 5).await;

    let uri = format!("/api/v1/products?limit=100&page={}", i64::MAX);
    let (status, json) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_product_lookup_errors() {
    let (app, _) = setup();

    let (status, _) = send(&app, "GET", "/api/v1/products/not-a-uuid", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing = uuid::Uuid::new_v4();
    let (status, _) = send(&app, "GET", &format!("/api/v1/products/{missing}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cart_lifecycle() {
    let (app, store) = setup();
    let admin = admin_token(&app, &store).await;
    let poster = create_product(&app, &admin, "Poster", 1000, 50).await;
    let token = customer_token(&app, "buyer@example.com").await;

    assert_eq!(add_to_cart(&app, &token, &poster, 0).await, StatusCode::BAD_REQUEST);
    assert_eq!(
        add_to_cart(&app, &token, &uuid::Uuid::new_v4().to_string(), 1).await,
        StatusCode::NOT_FOUND
    );
    assert_eq!(add_to_cart(&app, &token, &poster, 2).await, StatusCode::CREATED);
    assert_eq!(add_to_cart(&app, &token, &poster, 1).await, StatusCode::CREATED);

    let (status, cart) = send(&app, "GET", "/api/v1/cart", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
    assert_eq!(cart["items"][0]["quantity"], 3);
    assert_eq!(cart["items"][0]["subtotal"], 3000);
    assert_eq!(cart["total_price"], 3000);

    let uri = format!("/api/v1/cart/{poster}");
    let (status, _) = send(&app, "DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cart_quantity_past_column_range() {
    let (app, store) = setup();
    let admin = admin_token(&app, &store).await;
    let sticker = create_product(&app, &admin, "Sticker", 100, 5).await;
    let token = customer_token(&app, "buyer@example.com").await;

    assert_eq!(add_to_cart(&app, &token, &sticker, i32::MAX).await, StatusCode::CREATED);
    assert_eq!(add_to_cart(&app, &token, &sticker, 1).await, StatusCode::BAD_REQUEST);

    let (status, cart) = send(&app, "GET", "/api/v1/cart", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["items"][0]["quantity"], i32::MAX);
    assert_eq!(cart["total_price"], 100 * i64::from(i32::MAX));

    let (status, _) = send(&app, "POST", "/api/v1/checkout", Some(&token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_checkout_flow() {
    let (app, store) = setup();
    let admin = admin_token(&app, &store).await;
    let poster = create_product(&app, &admin, "Poster", 1000, 50).await;
    let mug = create_product(&app, &admin, "Mug", 500, 10).await;
    let token = customer_token(&app, "buyer@example.com").await;
    add_to_cart(&app, &token, &poster, 2).await;
    add_to_cart(&app, &token, &mug, 1).await;

    let (status, json) = send(&app, "POST", "/api/v1/checkout", Some(&token), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["total_amount"], 2500);
    assert_eq!(json["status"], "pending");
    assert_eq!(
        json["message"],
        "Checkout successful! Your order has been placed."
    );

    let (_, product) = send(&app, "GET", &format!("/api/v1/products/{poster}"), None, None).await;
    assert_eq!(product["stock_quantity"], 48);

    let (_, cart) = send(&app, "GET", "/api/v1/cart", Some(&token), None).await;
    assert!(cart["items"].as_array().unwrap().is_empty());

    let (status, _) = send(&app, "POST", "/api/v1/checkout", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, history) = send(&app, "GET", "/api/v1/orders", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_checkout_insufficient_stock() {
    let (app, store) = setup();
    let admin = admin_token(&app, &store).await;
    let poster = create_product(&app, &admin, "Poster", 2000, 5).await;
    let token = customer_token(&app, "buyer@example.com").await;
    add_to_cart(&app, &token, &poster, 10).await;

    let (status, json) = send(&app, "POST", "/api/v1/checkout", Some(&token), None).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("Insufficient stock"));
    let (_, cart) = send(&app, "GET", "/api/v1/cart", Some(&token), None).await;
    assert_eq!(cart["items"][0]["quantity"], 10);
}

#[tokio::test]
async fn test_order_status_updates() {
    let (app, store) = setup();
    let admin = admin_token(&app, &store).await;
    let poster = create_product(&app, &admin, "Poster", 2000, 5).await;
    let token = customer_token(&app, "buyer@example.com").await;
    add_to_cart(&app, &token, &poster, 1).await;
    let (_, receipt) = send(&app, "POST", "/api/v1/checkout", Some(&token), None).await;
    let uri = format!(
        "/api/v1/orders/{}/status",
        receipt["order_id"].as_str().unwrap()
    );

    let (status, _) = send(
        &app,
        "PUT",
        &uri,
        Some(&token),
        Some(json!({ "status": "processing" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "PUT", &uri, Some(&admin), Some(json!({ "status": "lost" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(
        &app,
        "PUT",
        &uri,
        Some(&admin),
        Some(json!({ "status": "processing" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "processing");

    let (status, _) = send(
        &app,
        "PUT",
        &uri,
        Some(&admin),
        Some(json!({ "status": "pending" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let missing = format!("/api/v1/orders/{}/status", uuid::Uuid::new_v4());
    let (status, _) = send(
        &app,
        "PUT",
        &missing,
        Some(&admin),
        Some(json!({ "status": "processing" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_ordered_product_conflicts() {
    let (app, store) = setup();
    let admin = admin_token(&app, &store).await;
    let poster = create_product(&app, &admin, "Poster", 2000, 5).await;
    let spare = create_product(&app, &admin, "Spare", 100, 1).await;
    let token = customer_token(&app, "buyer@example.com").await;
    add_to_cart(&app, &token, &poster, 1).await;
    send(&app, "POST", "/api/v1/checkout", Some(&token), None).await;

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/v1/products/{poster}"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/v1/products/{spare}"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}
