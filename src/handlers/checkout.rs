use crate::handlers::common::validate_input;
use crate::{
    errors::ServiceError,
    services::checkout::{CartLine, CheckoutOutcome, PlaceOrder},
    services::pricing::PriceBreakdown,
    AppState,
};
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Creates the router for checkout endpoints
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(place_order))
        .route("/quote", post(quote_cart))
}

/// One line of the submitted cart.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CartLineRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    /// Advisory only; the server re-reads the authoritative price
    pub unit_price: Option<Decimal>,
}

/// Shipping address snapshot stored verbatim on the order.
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct AddressRequest {
    #[validate(length(min = 1))]
    pub first_name: String,
    #[validate(length(min = 1))]
    pub last_name: String,
    #[validate(length(min = 1))]
    pub address_line_1: String,
    pub address_line_2: Option<String>,
    #[validate(length(min = 1))]
    pub city: String,
    #[validate(length(min = 1))]
    pub state: String,
    #[validate(length(min = 1))]
    pub postal_code: String,
    #[validate(length(equal = 2, message = "Country must be a 2-letter code"))]
    pub country: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CheckoutRequest {
    #[validate(length(min = 1, max = 128, message = "Idempotency key is required"))]
    pub idempotency_key: String,
    /// Authenticated user attached by the identity layer; absent for guests
    pub user_id: Option<Uuid>,
    pub cart: Vec<CartLineRequest>,
    #[validate]
    pub shipping_address: AddressRequest,
    pub discount_code: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct QuoteRequest {
    pub cart: Vec<CartLineRequest>,
    pub discount_code: Option<String>,
    pub user_id: Option<Uuid>,
}

/// Place an order for a cart
#[utoipa::path(
    post,
    path = "/api/v1/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Order placed", body = CheckoutOutcome),
        (status = 200, description = "Idempotent replay of a completed attempt", body = CheckoutOutcome),
        (status = 402, description = "Payment declined", body = crate::errors::ErrorResponse),
        (status = 409, description = "Idempotency key conflict", body = crate::errors::ErrorResponse),
        (status = 422, description = "Out of stock or discount not applicable", body = crate::errors::ErrorResponse),
        (status = 504, description = "Payment gateway timeout", body = crate::errors::ErrorResponse)
    ),
    tag = "checkout"
)]
pub async fn place_order(
    State(state): State<AppState>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    for line in &payload.cart {
        validate_input(line)?;
    }

    let input = PlaceOrder {
        idempotency_key: payload.idempotency_key,
        user_id: payload.user_id,
        lines: payload
            .cart
            .iter()
            .map(|l| CartLine {
                product_id: l.product_id,
                quantity: l.quantity,
            })
            .collect(),
        shipping_address: serde_json::to_value(&payload.shipping_address)
            .map_err(|e| ServiceError::InternalError(format!("Address serialization: {}", e)))?,
        discount_code: payload.discount_code,
    };

    let outcome = state.services.checkout.place_order(input).await?;
    let status = if outcome.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    Ok((status, Json(outcome)))
}

/// Price preview for a cart and optional discount code
#[utoipa::path(
    post,
    path = "/api/v1/checkout/quote",
    request_body = QuoteRequest,
    responses(
        (status = 200, description = "Authoritative price breakdown", body = PriceBreakdown),
        (status = 422, description = "Discount not applicable", body = crate::errors::ErrorResponse)
    ),
    tag = "checkout"
)]
pub async fn quote_cart(
    State(state): State<AppState>,
    Json(payload): Json<QuoteRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    for line in &payload.cart {
        validate_input(line)?;
    }

    let lines: Vec<CartLine> = payload
        .cart
        .iter()
        .map(|l| CartLine {
            product_id: l.product_id,
            quantity: l.quantity,
        })
        .collect();

    let breakdown = state
        .services
        .checkout
        .quote(&lines, payload.discount_code.as_deref(), payload.user_id)
        .await?;

    Ok(Json(breakdown))
}
