//! Inventory Ledger
//!
//! Guarantees stock is never oversold across concurrent checkouts. A hold is
//! taken with a single conditional UPDATE against the product row, so two
//! racing reservations cannot both succeed past available stock; the row
//! never needs a lock held across an await point.

use chrono::{DateTime, Duration, Utc};
use lazy_static::lazy_static;
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::ExprTrait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::entities::inventory_reservation::{
    self, Entity as InventoryReservationEntity, ReservationStatus,
};
use crate::entities::product::{self, Entity as ProductEntity, ProductStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

lazy_static! {
    static ref INVENTORY_RESERVATIONS: IntCounter = register_int_counter!(
        "inventory_reservations_total",
        "Total number of inventory reservations"
    )
    .expect("metric can be created");
    static ref INVENTORY_RESERVATION_FAILURES: IntCounterVec = register_int_counter_vec!(
        "inventory_reservation_failures_total",
        "Total number of failed inventory reservations",
        &["error_type"]
    )
    .expect("metric can be created");
}

/// Result of cleaning up expired reservations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupResult {
    /// Number of reservations marked as expired.
    pub expired_count: u64,
    /// Timestamp when cleanup was performed.
    pub cleaned_at: DateTime<Utc>,
}

/// Summary of a reservation for API responses.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ReservationSummary {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub status: String,
    pub reference_id: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub is_expired: bool,
}

impl From<inventory_reservation::Model> for ReservationSummary {
    fn from(model: inventory_reservation::Model) -> Self {
        let is_expired = model.is_expired(Utc::now());
        Self {
            id: model.id,
            product_id: model.product_id,
            quantity: model.quantity,
            status: model.status,
            reference_id: model.reference_id,
            expires_at: model.expires_at,
            created_at: model.created_at,
            is_expired,
        }
    }
}

/// Service for managing product stock through reservations.
#[derive(Clone)]
pub struct InventoryService {
    db_pool: Arc<DatabaseConnection>,
    event_sender: EventSender,
    reservation_ttl: Duration,
}

impl InventoryService {
    pub fn new(
        db_pool: Arc<DatabaseConnection>,
        event_sender: EventSender,
        reservation_ttl_minutes: i64,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            reservation_ttl: Duration::minutes(reservation_ttl_minutes),
        }
    }

    /// Takes a hold of `quantity` units against a published product.
    ///
    /// The availability check and the counter bump are one conditional
    /// UPDATE: `SET reserved_quantity = reserved_quantity + qty WHERE id = ?
    /// AND status = 'published' AND stock_quantity - reserved_quantity >=
    /// qty`. Zero rows affected means the product is missing, unpublished,
    /// or short on stock.
    #[instrument(skip(self))]
    pub async fn reserve(
        &self,
        product_id: Uuid,
        quantity: i32,
        reference_id: &str,
    ) -> Result<inventory_reservation::Model, ServiceError> {
        if quantity <= 0 {
            INVENTORY_RESERVATION_FAILURES
                .with_label_values(&["validation_error"])
                .inc();
            return Err(ServiceError::ValidationError(
                "Reservation quantity must be positive".to_string(),
            ));
        }

        let db = &*self.db_pool;

        let result = ProductEntity::update_many()
            .col_expr(
                product::Column::ReservedQuantity,
                Expr::col(product::Column::ReservedQuantity).add(quantity),
            )
            .col_expr(product::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .filter(product::Column::Id.eq(product_id))
            .filter(product::Column::Status.eq(ProductStatus::Published.as_str()))
            .filter(
                Expr::col(product::Column::StockQuantity)
                    .sub(Expr::col(product::Column::ReservedQuantity))
                    .gte(quantity),
            )
            .exec(db)
            .await?;

        if result.rows_affected == 0 {
            let product = ProductEntity::find_by_id(product_id).one(db).await?;
            return match product {
                Some(p) if p.is_published() => {
                    INVENTORY_RESERVATION_FAILURES
                        .with_label_values(&["insufficient_stock"])
                        .inc();
                    Err(ServiceError::InsufficientStock(format!(
                        "product {}: requested {}, available {}",
                        p.name,
                        quantity,
                        p.available()
                    )))
                }
                Some(p) => Err(ServiceError::InvalidOperation(format!(
                    "Product {} is not published",
                    p.name
                ))),
                None => Err(ServiceError::NotFound(format!(
                    "Product {} not found",
                    product_id
                ))),
            };
        }

        let now = Utc::now();
        let reservation = inventory_reservation::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            quantity: Set(quantity),
            status: Set(ReservationStatus::Active.as_str().to_string()),
            reference_id: Set(reference_id.to_string()),
            expires_at: Set(now + self.reservation_ttl),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };
        let reservation = reservation.insert(db).await?;

        INVENTORY_RESERVATIONS.inc();
        if let Err(e) = self
            .event_sender
            .send(Event::InventoryReserved {
                product_id,
                quantity,
                reservation_id: reservation.id,
                reference_id: reference_id.to_string(),
            })
            .await
        {
            warn!(error = %e, "Failed to publish reservation event");
        }

        Ok(reservation)
    }

    /// Converts a hold into a permanent stock decrement. Idempotent:
    /// committing an already-committed handle is a no-op.
    ///
    /// Runs on the caller's connection so it can join the order-persistence
    /// transaction.
    pub async fn commit<C: ConnectionTrait>(
        &self,
        conn: &C,
        reservation_id: Uuid,
    ) -> Result<bool, ServiceError> {
        let reservation = InventoryReservationEntity::find_by_id(reservation_id)
            .one(conn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Reservation {} not found", reservation_id))
            })?;

        match reservation.status() {
            Some(ReservationStatus::Committed) => return Ok(false),
            Some(ReservationStatus::Active) => {}
            _ => {
                return Err(ServiceError::InvalidOperation(format!(
                    "Cannot commit reservation {} in state {}",
                    reservation_id, reservation.status
                )))
            }
        }

        let flipped = InventoryReservationEntity::update_many()
            .col_expr(
                inventory_reservation::Column::Status,
                Expr::value(ReservationStatus::Committed.as_str()),
            )
            .col_expr(
                inventory_reservation::Column::UpdatedAt,
                Expr::value(Some(Utc::now())),
            )
            .filter(inventory_reservation::Column::Id.eq(reservation_id))
            .filter(
                inventory_reservation::Column::Status.eq(ReservationStatus::Active.as_str()),
            )
            .exec(conn)
            .await?;

        if flipped.rows_affected == 0 {
            // Lost a race; the winner already settled this handle.
            return Ok(false);
        }

        let adjusted = ProductEntity::update_many()
            .col_expr(
                product::Column::StockQuantity,
                Expr::col(product::Column::StockQuantity).sub(reservation.quantity),
            )
            .col_expr(
                product::Column::ReservedQuantity,
                Expr::col(product::Column::ReservedQuantity).sub(reservation.quantity),
            )
            .col_expr(product::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .filter(product::Column::Id.eq(reservation.product_id))
            .filter(product::Column::StockQuantity.gte(reservation.quantity))
            .filter(product::Column::ReservedQuantity.gte(reservation.quantity))
            .exec(conn)
            .await?;

        if adjusted.rows_affected == 0 {
            // A committed hold must always be covered by the counters it bumped.
            return Err(ServiceError::InternalError(format!(
                "Ledger mismatch committing reservation {} for product {}",
                reservation_id, reservation.product_id
            )));
        }

        Ok(true)
    }

    /// Cancels a hold without touching `stock_quantity`. Idempotent; used on
    /// checkout abandonment and payment failure.
    #[instrument(skip(self))]
    pub async fn release(&self, reservation_id: Uuid) -> Result<bool, ServiceError> {
        let db = &*self.db_pool;

        let reservation = InventoryReservationEntity::find_by_id(reservation_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Reservation {} not found", reservation_id))
            })?;

        match reservation.status() {
            Some(ReservationStatus::Active) => {}
            Some(ReservationStatus::Committed) => {
                warn!(
                    reservation_id = %reservation_id,
                    "Release requested for a committed reservation; ignoring"
                );
                return Ok(false);
            }
            _ => return Ok(false),
        }

        let flipped = InventoryReservationEntity::update_many()
            .col_expr(
                inventory_reservation::Column::Status,
                Expr::value(ReservationStatus::Released.as_str()),
            )
            .col_expr(
                inventory_reservation::Column::UpdatedAt,
                Expr::value(Some(Utc::now())),
            )
            .filter(inventory_reservation::Column::Id.eq(reservation_id))
            .filter(
                inventory_reservation::Column::Status.eq(ReservationStatus::Active.as_str()),
            )
            .exec(db)
            .await?;

        if flipped.rows_affected == 0 {
            return Ok(false);
        }

        self.return_hold(db, reservation.product_id, reservation.quantity)
            .await?;

        if let Err(e) = self
            .event_sender
            .send(Event::ReservationReleased {
                reservation_id,
                product_id: reservation.product_id,
                quantity: reservation.quantity,
            })
            .await
        {
            warn!(error = %e, "Failed to publish release event");
        }

        info!(reservation_id = %reservation_id, "Released reservation");
        Ok(true)
    }

    /// Marks overdue active reservations as expired and returns their hold.
    ///
    /// This runs periodically from a background task so abandoned checkouts
    /// cannot lock up stock past the TTL.
    #[instrument(skip(self))]
    pub async fn cleanup_expired(&self) -> Result<CleanupResult, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();

        let overdue = InventoryReservationEntity::find()
            .filter(inventory_reservation::Column::ExpiresAt.lt(now))
            .filter(
                inventory_reservation::Column::Status.eq(ReservationStatus::Active.as_str()),
            )
            .all(db)
            .await?;

        let mut expired_count = 0u64;

        for reservation in overdue {
            let flipped = InventoryReservationEntity::update_many()
                .col_expr(
                    inventory_reservation::Column::Status,
                    Expr::value(ReservationStatus::Expired.as_str()),
                )
                .col_expr(
                    inventory_reservation::Column::UpdatedAt,
                    Expr::value(Some(now)),
                )
                .filter(inventory_reservation::Column::Id.eq(reservation.id))
                .filter(
                    inventory_reservation::Column::Status
                        .eq(ReservationStatus::Active.as_str()),
                )
                .exec(db)
                .await?;

            if flipped.rows_affected == 0 {
                continue;
            }

            self.return_hold(db, reservation.product_id, reservation.quantity)
                .await?;
            expired_count += 1;
            info!(
                reservation_id = %reservation.id,
                product_id = %reservation.product_id,
                "Marked reservation as expired"
            );
        }

        if expired_count > 0 {
            if let Err(e) = self
                .event_sender
                .send(Event::ReservationsExpired {
                    count: expired_count,
                    swept_at: now,
                })
                .await
            {
                warn!(error = %e, "Failed to publish expiry event");
            }
        }

        Ok(CleanupResult {
            expired_count,
            cleaned_at: now,
        })
    }

    /// Lists reservations with pagination and optional filters.
    pub async fn list_reservations(
        &self,
        page: u64,
        limit: u64,
        status_filter: Option<&str>,
        product_id_filter: Option<Uuid>,
    ) -> Result<(Vec<ReservationSummary>, u64), ServiceError> {
        if page == 0 {
            return Err(ServiceError::ValidationError(
                "Page number must be greater than 0".to_string(),
            ));
        }
        if limit == 0 || limit > 1000 {
            return Err(ServiceError::ValidationError(
                "Limit must be between 1 and 1000".to_string(),
            ));
        }

        let db = &*self.db_pool;

        let mut query = InventoryReservationEntity::find();
        if let Some(status) = status_filter {
            query = query.filter(inventory_reservation::Column::Status.eq(status));
        }
        if let Some(product_id) = product_id_filter {
            query = query.filter(inventory_reservation::Column::ProductId.eq(product_id));
        }
        query = query.order_by_desc(inventory_reservation::Column::CreatedAt);

        let paginator = query.paginate(db, limit);
        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(page - 1).await?;

        Ok((models.into_iter().map(ReservationSummary::from).collect(), total))
    }

    /// Returns a released or expired hold to the available pool.
    async fn return_hold<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        ProductEntity::update_many()
            .col_expr(
                product::Column::ReservedQuantity,
                Expr::col(product::Column::ReservedQuantity).sub(quantity),
            )
            .col_expr(product::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .filter(product::Column::Id.eq(product_id))
            .filter(product::Column::ReservedQuantity.gte(quantity))
            .exec(conn)
            .await?;
        Ok(())
    }
}
