//! Order lifecycle tests: reads and fulfillment status transitions.

mod common;

use axum::http::{Method, StatusCode};
use common::{assert_error_kind, checkout_payload, response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

async fn place_test_order(app: &TestApp) -> String {
    let product = app.seed_product("Test product", dec!(50.00), 10).await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(checkout_payload(&[(product.id, 1)], "lifecycle-key", None)),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    body["order_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn placed_orders_are_readable_with_items() {
    let app = TestApp::new().await;
    let order_id = place_test_order(&app).await;

    let response = app
        .request(Method::GET, &format!("/api/v1/orders/{}", order_id), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"].as_str(), Some("paid"));
    assert!(body["order_number"].as_str().unwrap().starts_with("ORD-"));

    let items = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}/items", order_id),
            None,
        )
        .await;
    assert_eq!(items.status(), StatusCode::OK);
    let items_body = response_json(items).await;
    let items = items_body.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["product_name"].as_str(), Some("Test product"));
    assert_eq!(items[0]["quantity"].as_i64(), Some(1));
}

#[tokio::test]
async fn fulfillment_walks_the_status_graph() {
    let app = TestApp::new().await;
    let order_id = place_test_order(&app).await;

    for next in ["processing", "shipped", "delivered"] {
        let response = app
            .request(
                Method::POST,
                &format!("/api/v1/orders/{}/status", order_id),
                Some(json!({"status": next})),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK, "transition to {}", next);
        let body = response_json(response).await;
        assert_eq!(body["status"].as_str(), Some(next));
    }
}

#[tokio::test]
async fn shipped_orders_cannot_be_cancelled() {
    let app = TestApp::new().await;
    let order_id = place_test_order(&app).await;

    for next in ["processing", "shipped"] {
        let response = app
            .request(
                Method::POST,
                &format!("/api/v1/orders/{}/status", order_id),
                Some(json!({"status": next})),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{}/status", order_id),
            Some(json!({"status": "cancelled"})),
        )
        .await;
    let status = response.status();
    let body = response_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_kind(status, &body, "invalid_operation");
}

#[tokio::test]
async fn paid_orders_can_be_cancelled() {
    let app = TestApp::new().await;
    let order_id = place_test_order(&app).await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{}/status", order_id),
            Some(json!({"status": "cancelled"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"].as_str(), Some("cancelled"));
}

#[tokio::test]
async fn unknown_status_is_rejected() {
    let app = TestApp::new().await;
    let order_id = place_test_order(&app).await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{}/status", order_id),
            Some(json!({"status": "teleported"})),
        )
        .await;
    let status = response.status();
    let body = response_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_kind(status, &body, "validation_error");
}

#[tokio::test]
async fn missing_order_is_not_found() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}", uuid::Uuid::new_v4()),
            None,
        )
        .await;
    let status = response.status();
    let body = response_json(response).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_error_kind(status, &body, "not_found");
}
