use crate::handlers::common::{success_response, PaginatedResponse, PaginationParams};
use crate::{errors::ServiceError, AppState};
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use uuid::Uuid;

/// Creates the router for reservation operations
pub fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/reservations", get(list_reservations))
        .route("/reservations/cleanup", post(cleanup_reservations))
}

#[derive(Debug, Deserialize)]
pub struct ReservationFilters {
    pub status: Option<String>,
    pub product_id: Option<Uuid>,
}

/// List inventory reservations
#[utoipa::path(
    get,
    path = "/api/v1/inventory/reservations",
    params(PaginationParams),
    responses(
        (status = 200, description = "Reservation list returned"),
        (status = 400, description = "Invalid filters", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn list_reservations(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filters): Query<ReservationFilters>,
) -> Result<impl IntoResponse, ServiceError> {
    let (reservations, total) = state
        .services
        .inventory
        .list_reservations(
            pagination.page,
            pagination.per_page,
            filters.status.as_deref(),
            filters.product_id,
        )
        .await?;

    Ok(success_response(PaginatedResponse::new(
        reservations,
        pagination.page,
        pagination.per_page,
        total,
    )))
}

/// Sweep expired reservations now instead of waiting for the background task
#[utoipa::path(
    post,
    path = "/api/v1/inventory/reservations/cleanup",
    responses(
        (status = 200, description = "Sweep completed")
    ),
    tag = "inventory"
)]
pub async fn cleanup_reservations(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let result = state.services.inventory.cleanup_expired().await?;
    Ok(success_response(result))
}
