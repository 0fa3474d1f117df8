mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use common::*;
use storefront_engine::cart::InMemoryCartStore;
use storefront_engine::http::{router, AppState, CUSTOMER_HEADER};
use storefront_engine::notify::NoopPublisher;
use storefront_engine::search::InMemorySearchLedger;
use storefront_engine::EngineConfig;

fn app() -> Router {
    let catalog = catalog(vec![
        book("B1", "Dune", "10.00", 4),
        mobile("M1", "iPhone 14", "600.00", 2),
        mobile("M2", "iPhone 15", "900.00", 2),
        mobile("M3", "iPhone 15 Pro Max", "1500.00", 2),
    ]);
    let state = AppState::new(
        catalog,
        Arc::new(InMemoryCartStore::new()),
        Arc::new(InMemorySearchLedger::new()),
        Arc::new(NoopPublisher),
        EngineConfig::default(),
    );
    router(state)
}

async fn call(app: &Router, method: &str, uri: &str, customer: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(c) = customer {
        req = req.header(CUSTOMER_HEADER, c);
    }
    let req = match body {
        Some(b) => req.header("content-type", "application/json").body(Body::from(b.to_string())).unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let (status, body) = call(&app(), "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_search_endpoint_filters_and_sorts() {
    let app = app();
    let (status, body) = call(&app, "GET", "/api/v1/search?q=iphone&type=mobile&min_price=500&max_price=1000&sort_by=price_asc", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["query"], "iphone");
    assert_eq!(body["total_results"], 2);
    let ids: Vec<&str> = body["results"].as_array().unwrap().iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["M1", "M2"]);
    assert_eq!(body["results"][0]["type"], "mobile");

    let (status, body) = call(&app, "GET", "/api/v1/search?q=", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_query");
}

#[tokio::test]
async fn test_popular_and_suggestions() {
    let app = app();
    for _ in 0..2 {
        call(&app, "GET", "/api/v1/search?q=dune", None, None).await;
    }
    let (_, popular) = call(&app, "GET", "/api/v1/search/popular", None, None).await;
    assert_eq!(popular[0]["query"], "dune");
    assert_eq!(popular[0]["count"], 2);

    let (status, body) = call(&app, "GET", "/api/v1/search/suggestions?q=du", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(["Dune", "dune"]));
}

#[tokio::test]
async fn test_cart_requires_customer() {
    let (status, body) = call(&app(), "GET", "/api/v1/carts/active", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthenticated");
}

#[tokio::test]
async fn test_cart_flow_through_checkout() {
    let app = app();
    let (status, cart) = call(&app, "GET", "/api/v1/carts/active", Some("dave"), None).await;
    assert_eq!(status, StatusCode::OK);
    let id = cart["id"].as_str().unwrap().to_string();

    let add = json!({"product_type": "book", "product_id": "B1", "quantity": 2});
    let (status, cart) = call(&app, "POST", &format!("/api/v1/carts/{id}/add_item"), Some("dave"), Some(add)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["item_count"], 2);
    assert_eq!(cart["items"][0]["product_name"], "Dune");

    let too_many = json!({"product_type": "book", "product_id": "B1", "quantity": 3});
    let (status, err) = call(&app, "POST", &format!("/api/v1/carts/{id}/add_item"), Some("dave"), Some(too_many)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["code"], "insufficient_stock");
    assert_eq!(err["available"], 4);

    // Someone else's cart is invisible.
    let (status, _) = call(&app, "GET", &format!("/api/v1/carts/{id}"), Some("eve"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, done) = call(&app, "POST", &format!("/api/v1/carts/{id}/checkout"), Some("dave"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(done["old_cart"]["is_active"], false);
    assert_eq!(done["new_cart"]["is_active"], true);
    assert_eq!(done["new_cart"]["item_count"], 0);

    let (status, err) = call(&app, "POST", &format!("/api/v1/carts/{id}/clear"), Some("dave"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["code"], "cart_inactive");
}

#[tokio::test]
async fn test_add_item_body_validation() {
    let app = app();
    let (_, cart) = call(&app, "GET", "/api/v1/carts/active", Some("dave"), None).await;
    let id = cart["id"].as_str().unwrap().to_string();
    let blank = json!({"product_type": "book", "product_id": ""});
    let (status, err) = call(&app, "POST", &format!("/api/v1/carts/{id}/add_item"), Some("dave"), Some(blank)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["code"], "invalid_request");
}

#[tokio::test]
async fn test_malformed_requests_get_json_errors() {
    let app = app();
    let (_, cart) = call(&app, "GET", "/api/v1/carts/active", Some("dave"), None).await;
    let id = cart["id"].as_str().unwrap().to_string();

    let (status, err) = call(&app, "POST", &format!("/api/v1/carts/{id}/remove_item"), Some("dave"), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["code"], "invalid_request");
    assert!(err["error"].as_str().unwrap().contains("item_id"));

    let stringly = json!({"product_type": "book", "product_id": "B1", "quantity": "2"});
    let (status, err) = call(&app, "POST", &format!("/api/v1/carts/{id}/add_item"), Some("dave"), Some(stringly)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["code"], "invalid_request");

    let (status, err) = call(&app, "POST", "/api/v1/carts/not-a-uuid/clear", Some("dave"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["code"], "invalid_request");

    let (status, err) = call(&app, "GET", "/api/v1/search/popular?limit=lots", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["code"], "invalid_request");
}
