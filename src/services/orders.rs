//! Order persistence and fulfillment status transitions.
//!
//! Orders and their line items are written together inside the caller's
//! transaction and never deleted afterwards; fulfillment only moves the
//! status forward through the legal transitions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::order::{self, Entity as OrderEntity, OrderStatus};
use crate::entities::order_item::{self, Entity as OrderItemEntity};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::pricing::PriceBreakdown;

/// Immutable line snapshot captured at purchase time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLineSnapshot {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub size: Option<String>,
    pub color: Option<String>,
}

/// Everything required to persist a confirmed order.
#[derive(Debug, Clone)]
pub struct CreateOrderInput {
    pub user_id: Option<Uuid>,
    pub breakdown: PriceBreakdown,
    pub currency: String,
    pub shipping_address: serde_json::Value,
    pub payment_reference: String,
    pub discount_code: Option<String>,
    pub lines: Vec<OrderLineSnapshot>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Option<Uuid>,
    pub status: String,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub shipping_cost: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub payment_reference: Option<String>,
    pub discount_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<order::Model> for OrderResponse {
    fn from(model: order::Model) -> Self {
        Self {
            id: model.id,
            order_number: model.order_number,
            user_id: model.user_id,
            status: model.status,
            subtotal: model.subtotal,
            discount_amount: model.discount_amount,
            shipping_cost: model.shipping_cost,
            total: model.total,
            currency: model.currency,
            payment_reference: model.payment_reference,
            discount_code: model.discount_code,
            created_at: model.created_at,
        }
    }
}

/// Service for persisting and transitioning orders.
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl OrderService {
    pub fn new(db_pool: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Writes an order and its items on the caller's connection, so the
    /// orchestrator can bundle them with reservation commits and discount
    /// accounting in one transaction.
    pub async fn create_order_in_txn<C: ConnectionTrait>(
        &self,
        conn: &C,
        input: CreateOrderInput,
    ) -> Result<order::Model, ServiceError> {
        if input.lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "An order requires at least one line item".to_string(),
            ));
        }

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let order_number = format!("ORD-{}", order_id.to_string()[..8].to_uppercase());

        let order = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order_number),
            user_id: Set(input.user_id),
            status: Set(OrderStatus::Paid.as_str().to_string()),
            subtotal: Set(input.breakdown.subtotal),
            discount_amount: Set(input.breakdown.discount_amount),
            shipping_cost: Set(input.breakdown.shipping_cost),
            total: Set(input.breakdown.total),
            currency: Set(input.currency),
            shipping_address: Set(Some(input.shipping_address.to_string())),
            payment_reference: Set(Some(input.payment_reference)),
            discount_code: Set(input.discount_code),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };
        let order = order.insert(conn).await?;

        for line in &input.lines {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product_id),
                product_name: Set(line.product_name.clone()),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                size: Set(line.size.clone()),
                color: Set(line.color.clone()),
                created_at: Set(now),
            };
            item.insert(conn).await?;
        }

        Ok(order)
    }

    /// Fetches an order by id.
    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db_pool;
        let order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        Ok(order.into())
    }

    /// Lists orders, newest first, optionally scoped to one user.
    pub async fn list_orders(
        &self,
        page: u64,
        limit: u64,
        user_id: Option<Uuid>,
    ) -> Result<(Vec<OrderResponse>, u64), ServiceError> {
        if page == 0 {
            return Err(ServiceError::ValidationError(
                "Page number must be greater than 0".to_string(),
            ));
        }

        let db = &*self.db_pool;
        let mut query = OrderEntity::find().order_by_desc(order::Column::CreatedAt);
        if let Some(user) = user_id {
            query = query.filter(order::Column::UserId.eq(user));
        }

        let paginator = query.paginate(db, limit.clamp(1, 100));
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page - 1).await?;

        Ok((orders.into_iter().map(Into::into).collect(), total))
    }

    /// Line items for an order.
    pub async fn get_order_items(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<order_item::Model>, ServiceError> {
        let db = &*self.db_pool;

        let order = OrderEntity::find_by_id(order_id).one(db).await?;
        if order.is_none() {
            return Err(ServiceError::NotFound(format!(
                "Order {} not found",
                order_id
            )));
        }

        Ok(OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(db)
            .await?)
    }

    /// Moves an order to a new fulfillment status, enforcing the legal
    /// transition graph (cancellation only before shipment).
    #[instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db_pool;
        let order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let current = order.status().ok_or_else(|| {
            ServiceError::InternalError(format!(
                "Order {} has unrecognized status {}",
                order_id, order.status
            ))
        })?;

        if !current.can_transition_to(new_status) {
            return Err(ServiceError::InvalidOperation(format!(
                "Cannot move order {} from {} to {}",
                order_id,
                current.as_str(),
                new_status.as_str()
            )));
        }

        let old_status = order.status.clone();
        let mut active: order::ActiveModel = order.into();
        active.status = Set(new_status.as_str().to_string());
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(db).await?;

        if let Err(e) = self
            .event_sender
            .send(Event::OrderStatusChanged {
                order_id,
                old_status: old_status.clone(),
                new_status: new_status.as_str().to_string(),
            })
            .await
        {
            warn!(error = %e, "Failed to publish status change event");
        }

        info!(
            order_id = %order_id,
            from = %old_status,
            to = %new_status.as_str(),
            "Order status updated"
        );

        Ok(updated.into())
    }
}
