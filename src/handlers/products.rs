use crate::handlers::common::{success_response, PaginatedResponse, PaginationParams};
use crate::{
    entities::product::{self, Entity as ProductEntity, ProductStatus},
    errors::ServiceError,
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Creates the router for storefront catalog reads
pub fn products_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/{id}", get(get_product))
}

#[derive(Debug, Deserialize)]
pub struct ProductFilters {
    /// Case-insensitive substring match on the product name
    pub search: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub sku: String,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    /// Units a shopper can still buy right now
    pub available: i32,
    pub size: Option<String>,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<product::Model> for ProductResponse {
    fn from(model: product::Model) -> Self {
        let available = model.available();
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            sku: model.sku,
            price: model.price,
            sale_price: model.sale_price,
            available,
            size: model.size,
            color: model.color,
            created_at: model.created_at,
        }
    }
}

/// List published products
#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(PaginationParams),
    responses(
        (status = 200, description = "Product list returned")
    ),
    tag = "products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filters): Query<ProductFilters>,
) -> Result<impl IntoResponse, ServiceError> {
    if pagination.page == 0 {
        return Err(ServiceError::ValidationError(
            "Page number must be greater than 0".to_string(),
        ));
    }

    let mut query = ProductEntity::find()
        .filter(product::Column::Status.eq(ProductStatus::Published.as_str()))
        .order_by_desc(product::Column::CreatedAt);

    if let Some(search) = filters.search.as_deref().filter(|s| !s.trim().is_empty()) {
        query = query.filter(product::Column::Name.contains(search.trim()));
    }

    let paginator = query.paginate(&*state.db, pagination.per_page.clamp(1, 100));
    let total = paginator.num_items().await?;
    let products = paginator.fetch_page(pagination.page - 1).await?;

    let products: Vec<ProductResponse> = products.into_iter().map(Into::into).collect();

    Ok(success_response(PaginatedResponse::new(
        products,
        pagination.page,
        pagination.per_page,
        total,
    )))
}

/// Fetch a published product
#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product returned", body = ProductResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = ProductEntity::find_by_id(id)
        .one(&*state.db)
        .await?
        .filter(|p| p.is_published())
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))?;

    Ok(success_response(ProductResponse::from(product)))
}
