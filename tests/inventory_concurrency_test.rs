//! Tests for the inventory ledger: reservation atomicity under concurrent
//! checkouts, idempotent settlement, and TTL expiry.

mod common;

use std::sync::Arc;

use common::{checkout_payload, response_json, TestApp};
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use storefront_api::entities::{inventory_reservation, product};
use storefront_api::services::checkout::{CartLine, PlaceOrder};
use storefront_api::services::inventory::InventoryService;

fn place_order_input(product_id: uuid::Uuid, quantity: i32, key: &str) -> PlaceOrder {
    PlaceOrder {
        idempotency_key: key.to_string(),
        user_id: None,
        lines: vec![CartLine {
            product_id,
            quantity,
        }],
        shipping_address: serde_json::json!({"city": "Portland"}),
        discount_code: None,
    }
}

#[tokio::test]
async fn two_simultaneous_checkouts_one_wins() {
    let app = TestApp::new().await;
    let last_unit = app.seed_product("Last unit", dec!(30.00), 1).await;

    let checkout = app.state.services.checkout.clone();
    let first = tokio::spawn({
        let checkout = checkout.clone();
        let input = place_order_input(last_unit.id, 1, "race-a");
        async move { checkout.place_order(input).await }
    });
    let second = tokio::spawn({
        let input = place_order_input(last_unit.id, 1, "race-b");
        async move { checkout.place_order(input).await }
    });

    let results = [first.await.unwrap(), second.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let stockouts = results
        .iter()
        .filter(|r| matches!(r, Err(e) if e.kind() == "insufficient_stock"))
        .count();

    assert_eq!(successes, 1, "exactly one checkout should win");
    assert_eq!(stockouts, 1, "the loser should see insufficient stock");

    let updated = product::Entity::find_by_id(last_unit.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.stock_quantity, 0);
    assert_eq!(updated.reserved_quantity, 0);
}

#[tokio::test]
async fn concurrent_reserves_never_exceed_stock() {
    let app = TestApp::new().await;
    let popular = app.seed_product("Popular item", dec!(10.00), 10).await;

    // 20 concurrent single-unit reservations against stock 10
    let mut tasks = vec![];
    for i in 0..20 {
        let inventory = app.state.services.inventory.clone();
        let id = popular.id;
        let reference = format!("burst-{}", i);
        tasks.push(tokio::spawn(async move {
            inventory.reserve(id, 1, &reference).await.is_ok()
        }));
    }

    let mut successes = 0;
    for task in tasks {
        if task.await.unwrap() {
            successes += 1;
        }
    }

    assert_eq!(
        successes, 10,
        "exactly 10 reservations should succeed; got {}",
        successes
    );

    let updated = product::Entity::find_by_id(popular.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.reserved_quantity, 10);
    assert_eq!(updated.available(), 0);
}

#[tokio::test]
async fn commit_is_idempotent() {
    let app = TestApp::new().await;
    let item = app.seed_product("Committable", dec!(15.00), 5).await;

    let inventory = &app.state.services.inventory;
    let reservation = inventory.reserve(item.id, 2, "commit-test").await.unwrap();

    assert!(inventory.commit(&*app.state.db, reservation.id).await.unwrap());
    // Second commit is a no-op
    assert!(!inventory.commit(&*app.state.db, reservation.id).await.unwrap());

    let updated = product::Entity::find_by_id(item.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.stock_quantity, 3);
    assert_eq!(updated.reserved_quantity, 0);
}

#[tokio::test]
async fn release_is_idempotent_and_keeps_stock() {
    let app = TestApp::new().await;
    let item = app.seed_product("Releasable", dec!(15.00), 5).await;

    let inventory = &app.state.services.inventory;
    let reservation = inventory.reserve(item.id, 2, "release-test").await.unwrap();

    assert!(inventory.release(reservation.id).await.unwrap());
    assert!(!inventory.release(reservation.id).await.unwrap());

    let updated = product::Entity::find_by_id(item.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.stock_quantity, 5);
    assert_eq!(updated.reserved_quantity, 0);
}

#[tokio::test]
async fn expired_reservations_return_their_hold() {
    let app = TestApp::new().await;
    let item = app.seed_product("Abandoned cart item", dec!(25.00), 3).await;

    // A zero-TTL ledger makes every reservation instantly overdue
    let impatient = InventoryService::new(
        app.state.db.clone(),
        app.state.event_sender.clone(),
        0,
    );

    let reservation = impatient.reserve(item.id, 2, "abandoned").await.unwrap();

    let held = product::Entity::find_by_id(item.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(held.reserved_quantity, 2);

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let result = impatient.cleanup_expired().await.unwrap();
    assert_eq!(result.expired_count, 1);

    let swept = product::Entity::find_by_id(item.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(swept.reserved_quantity, 0);
    assert_eq!(swept.stock_quantity, 3);

    let stored = inventory_reservation::Entity::find_by_id(reservation.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, "expired");
}

#[tokio::test]
async fn released_stock_is_immediately_resellable() {
    let app = TestApp::with_gateway(Arc::new(common::DecliningGateway)).await;
    let item = app.seed_product("Contested item", dec!(45.00), 1).await;

    // First shopper's payment is declined; the hold must come back.
    let declined = app
        .request(
            axum::http::Method::POST,
            "/api/v1/checkout",
            Some(checkout_payload(&[(item.id, 1)], "resell-a", None)),
        )
        .await;
    assert_eq!(declined.status(), axum::http::StatusCode::PAYMENT_REQUIRED);
    let _ = response_json(declined).await;

    // Second shopper can now reserve the same unit at the service level.
    let reservation = app
        .state
        .services
        .inventory
        .reserve(item.id, 1, "resell-b")
        .await;
    assert!(reservation.is_ok(), "released unit should be reservable");
}
