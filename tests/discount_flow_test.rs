//! Tests for discount validation ordering, usage accounting, and the admin
//! surface.

mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use common::{discount_fixture, response_json, TestApp};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::json;
use storefront_api::entities::{discount_code, discount_redemption};
use uuid::Uuid;

#[tokio::test]
async fn unknown_and_inactive_codes_are_not_found() {
    let app = TestApp::new().await;
    let discounts = &app.state.services.discounts;

    let err = discounts
        .validate("NOSUCHCODE", dec!(100), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "code_not_found");

    let mut disabled = discount_fixture("DISABLED", "percentage", dec!(10));
    disabled.is_active = false;
    app.seed_discount(disabled).await;

    let err = discounts
        .validate("DISABLED", dec!(100), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "code_not_found");
}

#[tokio::test]
async fn code_matching_is_case_insensitive() {
    let app = TestApp::new().await;
    app.seed_discount(discount_fixture("SAVE10", "percentage", dec!(10)))
        .await;

    let application = app
        .state
        .services
        .discounts
        .validate("  save10 ", dec!(100), None)
        .await
        .unwrap();
    assert_eq!(application.code, "SAVE10");
}

#[tokio::test]
async fn not_yet_active_code_is_rejected() {
    let app = TestApp::new().await;
    let mut future = discount_fixture("SOON", "percentage", dec!(10));
    future.valid_from = Utc::now() + Duration::days(7);
    future.valid_until = None;
    app.seed_discount(future).await;

    let err = app
        .state
        .services
        .discounts
        .validate("SOON", dec!(100), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "code_not_yet_active");
}

#[tokio::test]
async fn minimum_purchase_is_enforced() {
    let app = TestApp::new().await;
    let mut premium = discount_fixture("BIGSPEND", "fixed", dec!(25));
    premium.min_purchase_amount = dec!(200);
    app.seed_discount(premium).await;

    let err = app
        .state
        .services
        .discounts
        .validate("BIGSPEND", dec!(199.99), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "minimum_not_met");

    // At the minimum the code applies
    let application = app
        .state
        .services
        .discounts
        .validate("BIGSPEND", dec!(200), None)
        .await
        .unwrap();
    assert_eq!(application.code, "BIGSPEND");
}

#[tokio::test]
async fn exhausted_global_limit_is_rejected_at_validation() {
    let app = TestApp::new().await;
    let mut capped = discount_fixture("CAPPED", "percentage", dec!(10));
    capped.usage_limit = Some(5);
    capped.usage_count = 5;
    app.seed_discount(capped).await;

    let err = app
        .state
        .services
        .discounts
        .validate("CAPPED", dec!(100), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "usage_limit_exceeded");
}

#[tokio::test]
async fn redeem_respects_the_usage_limit() {
    let app = TestApp::new().await;
    let mut single_use = discount_fixture("ONEUSE", "percentage", dec!(10));
    single_use.usage_limit = Some(1);
    let code = app.seed_discount(single_use).await;

    let discounts = &app.state.services.discounts;
    let db = &*app.state.db;

    discounts.redeem(db, code.id).await.unwrap();
    let err = discounts.redeem(db, code.id).await.unwrap_err();
    assert_eq!(err.kind(), "usage_limit_exceeded");

    let stored = discount_code::Entity::find_by_id(code.id)
        .one(db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.usage_count, 1);
}

#[tokio::test]
async fn per_user_limit_counts_past_redemptions() {
    let app = TestApp::new().await;
    let code = app
        .seed_discount(discount_fixture("LOYAL", "percentage", dec!(10)))
        .await;
    let user = Uuid::new_v4();

    // Record a past redemption for this user
    let past = discount_redemption::ActiveModel {
        id: Set(Uuid::new_v4()),
        discount_code_id: Set(code.id),
        order_id: Set(Uuid::new_v4()),
        user_id: Set(Some(user)),
        amount_applied: Set(dec!(5)),
        redeemed_at: Set(Utc::now()),
    };
    past.insert(&*app.state.db).await.unwrap();

    let discounts = &app.state.services.discounts;

    let err = discounts
        .validate("LOYAL", dec!(100), Some(user))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "per_user_limit_exceeded");

    // A different user is unaffected
    assert!(discounts
        .validate("LOYAL", dec!(100), Some(Uuid::new_v4()))
        .await
        .is_ok());

    // Guests are exempt from the per-user check
    assert!(discounts.validate("LOYAL", dec!(100), None).await.is_ok());
}

#[tokio::test]
async fn buy_x_get_y_codes_cannot_be_applied() {
    let app = TestApp::new().await;
    app.seed_discount(discount_fixture("BOGO", "buy_x_get_y", dec!(1)))
        .await;

    let err = app
        .state
        .services
        .discounts
        .validate("BOGO", dec!(100), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "unsupported_discount_type");
}

// ==================== Admin surface ====================

#[tokio::test]
async fn admin_can_create_list_and_toggle_codes() {
    let app = TestApp::new().await;

    let created = app
        .request(
            Method::POST,
            "/api/v1/discounts",
            Some(json!({
                "code": "spring20",
                "discount_type": "percentage",
                "discount_value": "20",
                "usage_limit": 100
            })),
        )
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let body = response_json(created).await;
    // Stored uppercase
    assert_eq!(body["code"].as_str(), Some("SPRING20"));
    let id = body["id"].as_str().unwrap().to_string();

    let listed = app.request(Method::GET, "/api/v1/discounts", None).await;
    assert_eq!(listed.status(), StatusCode::OK);
    let listing = response_json(listed).await;
    assert_eq!(listing["data"].as_array().unwrap().len(), 1);

    let toggled = app
        .request(
            Method::POST,
            &format!("/api/v1/discounts/{}/toggle", id),
            Some(json!({"is_active": false})),
        )
        .await;
    assert_eq!(toggled.status(), StatusCode::OK);
    let toggled_body = response_json(toggled).await;
    assert_eq!(toggled_body["is_active"].as_bool(), Some(false));

    // A disabled code no longer validates
    let err = app
        .state
        .services
        .discounts
        .validate("SPRING20", dec!(100), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "code_not_found");
}

#[tokio::test]
async fn duplicate_codes_are_rejected() {
    let app = TestApp::new().await;
    app.seed_discount(discount_fixture("TAKEN", "fixed", dec!(5)))
        .await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/discounts",
            Some(json!({
                "code": "taken",
                "discount_type": "fixed",
                "discount_value": "5"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn percentage_over_100_is_rejected() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/discounts",
            Some(json!({
                "code": "TOOMUCH",
                "discount_type": "percentage",
                "discount_value": "150"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
