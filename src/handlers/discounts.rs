use crate::handlers::common::{created_response, success_response, PaginatedResponse, PaginationParams};
use crate::{
    entities::discount_code,
    errors::ServiceError,
    services::discounts::{CreateDiscountCode, UpdateDiscountCode},
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Creates the router for discount administration
pub fn discounts_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_discount).get(list_discounts))
        .route("/{id}", put(update_discount))
        .route("/{id}/toggle", post(toggle_discount))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DiscountCodeResponse {
    pub id: Uuid,
    pub code: String,
    pub description: Option<String>,
    pub discount_type: String,
    pub discount_value: Decimal,
    pub min_purchase_amount: Decimal,
    pub max_discount_amount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub usage_count: i32,
    pub per_user_limit: i32,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<discount_code::Model> for DiscountCodeResponse {
    fn from(model: discount_code::Model) -> Self {
        Self {
            id: model.id,
            code: model.code,
            description: model.description,
            discount_type: model.discount_type,
            discount_value: model.discount_value,
            min_purchase_amount: model.min_purchase_amount,
            max_discount_amount: model.max_discount_amount,
            usage_limit: model.usage_limit,
            usage_count: model.usage_count,
            per_user_limit: model.per_user_limit,
            valid_from: model.valid_from,
            valid_until: model.valid_until,
            is_active: model.is_active,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ToggleRequest {
    pub is_active: bool,
}

/// Create a discount code
#[utoipa::path(
    post,
    path = "/api/v1/discounts",
    request_body = CreateDiscountCode,
    responses(
        (status = 201, description = "Discount code created", body = DiscountCodeResponse),
        (status = 400, description = "Invalid rules or duplicate code", body = crate::errors::ErrorResponse)
    ),
    tag = "discounts"
)]
pub async fn create_discount(
    State(state): State<AppState>,
    Json(payload): Json<CreateDiscountCode>,
) -> Result<impl IntoResponse, ServiceError> {
    let created = state.services.discounts.create_code(payload).await?;
    Ok(created_response(DiscountCodeResponse::from(created)))
}

/// List discount codes, newest first
#[utoipa::path(
    get,
    path = "/api/v1/discounts",
    params(PaginationParams),
    responses(
        (status = 200, description = "Discount code list returned")
    ),
    tag = "discounts"
)]
pub async fn list_discounts(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let (codes, total) = state
        .services
        .discounts
        .list_codes(pagination.page, pagination.per_page)
        .await?;

    let codes: Vec<DiscountCodeResponse> = codes.into_iter().map(Into::into).collect();

    Ok(success_response(PaginatedResponse::new(
        codes,
        pagination.page,
        pagination.per_page,
        total,
    )))
}

/// Update a discount code's rules
#[utoipa::path(
    put,
    path = "/api/v1/discounts/{id}",
    params(("id" = Uuid, Path, description = "Discount code id")),
    request_body = UpdateDiscountCode,
    responses(
        (status = 200, description = "Discount code updated", body = DiscountCodeResponse),
        (status = 404, description = "Discount code not found", body = crate::errors::ErrorResponse)
    ),
    tag = "discounts"
)]
pub async fn update_discount(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDiscountCode>,
) -> Result<impl IntoResponse, ServiceError> {
    let updated = state.services.discounts.update_code(id, payload).await?;
    Ok(success_response(DiscountCodeResponse::from(updated)))
}

/// Enable or disable a discount code
#[utoipa::path(
    post,
    path = "/api/v1/discounts/{id}/toggle",
    params(("id" = Uuid, Path, description = "Discount code id")),
    request_body = ToggleRequest,
    responses(
        (status = 200, description = "Discount code toggled", body = DiscountCodeResponse),
        (status = 404, description = "Discount code not found", body = crate::errors::ErrorResponse)
    ),
    tag = "discounts"
)]
pub async fn toggle_discount(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ToggleRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let updated = state
        .services
        .discounts
        .set_active(id, payload.is_active)
        .await?;
    Ok(success_response(DiscountCodeResponse::from(updated)))
}
