//! Order Orchestrator
//!
//! Coordinates inventory reservation, discount redemption, payment capture
//! and order persistence as one logical transaction with compensating
//! actions on failure:
//!
//! `Initiated -> InventoryReserved -> PaymentPending -> PaymentConfirmed ->
//! OrderPersisted`, with failure edges from every non-terminal state to
//! `RolledBack`. The payment gateway cannot join a database transaction, so
//! reservations are released (not rolled back) when a later step fails, and
//! a persistence failure after capture lands in the alert-only
//! `payment_captured_unreconciled` state instead of being retried.

use chrono::Utc;
use lazy_static::lazy_static;
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::checkout_attempt::{self, AttemptStatus, Entity as CheckoutAttemptEntity};
use crate::entities::inventory_reservation;
use crate::entities::order::{self, Entity as OrderEntity};
use crate::entities::product::{self, Entity as ProductEntity};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::discounts::{DiscountApplication, DiscountService};
use crate::services::inventory::InventoryService;
use crate::services::orders::{CreateOrderInput, OrderLineSnapshot, OrderService};
use crate::services::payments::{ChargeOutcome, ChargeRequest, GatewayError, PaymentGateway};
use crate::services::pricing::{DiscountEffect, PriceBreakdown, PricingService};

/// Payment reference recorded when a zero-total order skips the gateway.
const FREE_ORDER_REFERENCE: &str = "free-order";

lazy_static! {
    static ref CHECKOUT_ATTEMPTS: IntCounter = register_int_counter!(
        "checkout_attempts_total",
        "Total number of checkout attempts"
    )
    .expect("metric can be created");
    static ref CHECKOUT_FAILURES: IntCounterVec = register_int_counter_vec!(
        "checkout_failures_total",
        "Total number of failed checkout attempts",
        &["error_kind"]
    )
    .expect("metric can be created");
    static ref ORDERS_PLACED: IntCounter =
        register_int_counter!("orders_placed_total", "Total number of orders placed")
            .expect("metric can be created");
}

/// One cart line as submitted by the client. The unit price is advisory;
/// the authoritative price is read from the product row at snapshot time.
#[derive(Debug, Clone)]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// A checkout submission.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub idempotency_key: String,
    pub user_id: Option<Uuid>,
    pub lines: Vec<CartLine>,
    pub shipping_address: serde_json::Value,
    pub discount_code: Option<String>,
}

/// Terminal result of a checkout.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckoutOutcome {
    pub order_id: Uuid,
    pub order_number: String,
    pub status: String,
    pub total: Decimal,
    /// True when this response replays a previously completed attempt
    pub replayed: bool,
}

/// Server-side cart snapshot, immutable once checkout begins.
struct CartSnapshot {
    lines: Vec<OrderLineSnapshot>,
    subtotal: Decimal,
}

/// Orchestrates the full checkout state machine.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    inventory: Arc<InventoryService>,
    discounts: Arc<DiscountService>,
    pricing: PricingService,
    orders: Arc<OrderService>,
    gateway: Arc<dyn PaymentGateway>,
    event_sender: EventSender,
    currency: String,
    payment_timeout: Duration,
}

impl CheckoutService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Arc<DatabaseConnection>,
        inventory: Arc<InventoryService>,
        discounts: Arc<DiscountService>,
        pricing: PricingService,
        orders: Arc<OrderService>,
        gateway: Arc<dyn PaymentGateway>,
        event_sender: EventSender,
        currency: String,
        payment_timeout: Duration,
    ) -> Self {
        Self {
            db,
            inventory,
            discounts,
            pricing,
            orders,
            gateway,
            event_sender,
            currency,
            payment_timeout,
        }
    }

    /// Places an order for a cart. Replaying the same idempotency key with
    /// the same cart returns the original result without re-reserving or
    /// re-charging.
    #[instrument(skip(self, input), fields(idempotency_key = %input.idempotency_key))]
    pub async fn place_order(&self, input: PlaceOrder) -> Result<CheckoutOutcome, ServiceError> {
        CHECKOUT_ATTEMPTS.inc();
        validate_submission(&input)?;

        let cart_hash = fingerprint(&input);

        if let Some(replay) = self.resolve_prior_attempt(&input, &cart_hash).await? {
            info!(order_id = %replay.order_id, "Replaying completed checkout attempt");
            return Ok(replay);
        }

        self.begin_attempt(&input.idempotency_key, &cart_hash).await?;

        match self.run(&input).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                CHECKOUT_FAILURES.with_label_values(&[err.kind()]).inc();
                // The unreconciled path records its own terminal state.
                if !matches!(err, ServiceError::PaymentCapturedUnreconciled(_)) {
                    self.mark_attempt_failed(&input.idempotency_key, err.kind())
                        .await;
                }
                Err(err)
            }
        }
    }

    /// Price preview for a cart and optional code; shares every rule with
    /// the real checkout so the preview cannot drift from the charge.
    pub async fn quote(
        &self,
        lines: &[CartLine],
        discount_code: Option<&str>,
        user_id: Option<Uuid>,
    ) -> Result<PriceBreakdown, ServiceError> {
        if lines.is_empty() {
            return Err(ServiceError::ValidationError("Cart is empty".to_string()));
        }

        let snapshot = self.snapshot_cart(lines).await?;
        let effect = match discount_code {
            Some(code) => {
                self.discounts
                    .validate(code, snapshot.subtotal, user_id)
                    .await?
                    .effect
            }
            None => DiscountEffect::None,
        };

        Ok(self.pricing.quote(snapshot.subtotal, effect))
    }

    async fn run(&self, input: &PlaceOrder) -> Result<CheckoutOutcome, ServiceError> {
        debug!("Checkout initiated");

        // Snapshot the cart against live catalog rows; prices are re-read
        // server-side so a tampered client total changes nothing.
        let snapshot = self.snapshot_cart(&input.lines).await?;

        let application = match input.discount_code.as_deref() {
            Some(code) => Some(
                self.discounts
                    .validate(code, snapshot.subtotal, input.user_id)
                    .await?,
            ),
            None => None,
        };

        // Initiated -> InventoryReserved
        let reservations = self.reserve_cart(input, &snapshot).await?;
        debug!(count = reservations.len(), "Inventory reserved");

        let effect = application
            .as_ref()
            .map(|a| a.effect)
            .unwrap_or(DiscountEffect::None);
        let breakdown = self.pricing.quote(snapshot.subtotal, effect);

        // InventoryReserved -> PaymentPending -> PaymentConfirmed
        let payment_reference = match self.capture_payment(input, &breakdown).await {
            Ok(reference) => reference,
            Err(err) => {
                self.release_all(&reservations).await;
                return Err(err);
            }
        };
        let charged = payment_reference != FREE_ORDER_REFERENCE;
        debug!(reference = %payment_reference, "Payment confirmed");

        // PaymentConfirmed -> OrderPersisted
        match self
            .persist_order(input, snapshot, &breakdown, application.as_ref(), &reservations, &payment_reference)
            .await
        {
            Ok(order) => {
                ORDERS_PLACED.inc();
                self.publish_success_events(&order, application.as_ref(), &breakdown)
                    .await;
                info!(order_id = %order.id, order_number = %order.order_number, "Checkout completed");
                Ok(CheckoutOutcome {
                    order_id: order.id,
                    order_number: order.order_number,
                    status: order.status,
                    total: order.total,
                    replayed: false,
                })
            }
            Err(err) if charged => {
                // Money moved and the order write failed. Never retried
                // automatically; flagged for manual reconciliation.
                error!(
                    idempotency_key = %input.idempotency_key,
                    payment_reference = %payment_reference,
                    error = %err,
                    "Order persistence failed after payment capture"
                );
                self.flag_unreconciled(&input.idempotency_key, &payment_reference, breakdown.total)
                    .await;
                Err(ServiceError::PaymentCapturedUnreconciled(payment_reference))
            }
            Err(err) => {
                // Nothing was charged; plain rollback.
                self.release_all(&reservations).await;
                Err(err)
            }
        }
    }

    /// Reads every cart line's product row and freezes names, variants and
    /// sale-aware unit prices.
    async fn snapshot_cart(&self, lines: &[CartLine]) -> Result<CartSnapshot, ServiceError> {
        let ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
        let products = ProductEntity::find()
            .filter(product::Column::Id.is_in(ids))
            .all(&*self.db)
            .await?;

        let mut snapshot_lines = Vec::with_capacity(lines.len());
        let mut subtotal = Decimal::ZERO;

        for line in lines {
            let product = products
                .iter()
                .find(|p| p.id == line.product_id)
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", line.product_id))
                })?;

            if !product.is_published() {
                return Err(ServiceError::InvalidOperation(format!(
                    "Product {} is not available for sale",
                    product.name
                )));
            }

            let unit_price = product.unit_price();
            subtotal += unit_price * Decimal::from(line.quantity);

            snapshot_lines.push(OrderLineSnapshot {
                product_id: product.id,
                product_name: product.name.clone(),
                quantity: line.quantity,
                unit_price,
                size: product.size.clone(),
                color: product.color.clone(),
            });
        }

        Ok(CartSnapshot {
            lines: snapshot_lines,
            subtotal,
        })
    }

    /// Reserves every line; any single failure releases this attempt's prior
    /// reservations before surfacing the error.
    async fn reserve_cart(
        &self,
        input: &PlaceOrder,
        snapshot: &CartSnapshot,
    ) -> Result<Vec<inventory_reservation::Model>, ServiceError> {
        let mut reservations = Vec::with_capacity(snapshot.lines.len());

        for line in &snapshot.lines {
            match self
                .inventory
                .reserve(line.product_id, line.quantity, &input.idempotency_key)
                .await
            {
                Ok(reservation) => reservations.push(reservation),
                Err(err) => {
                    self.release_all(&reservations).await;
                    return Err(err);
                }
            }
        }

        Ok(reservations)
    }

    /// Requests a charge for the authoritative total. Transport failures are
    /// retried exactly once; a decline never is. Zero-total orders skip the
    /// gateway entirely.
    async fn capture_payment(
        &self,
        input: &PlaceOrder,
        breakdown: &PriceBreakdown,
    ) -> Result<String, ServiceError> {
        if breakdown.total.is_zero() {
            return Ok(FREE_ORDER_REFERENCE.to_string());
        }

        let request = ChargeRequest {
            amount: breakdown.total,
            currency: self.currency.clone(),
            idempotency_key: input.idempotency_key.clone(),
            metadata: serde_json::json!({
                "user_id": input.user_id,
                "subtotal": breakdown.subtotal,
                "discount_amount": breakdown.discount_amount,
            }),
        };

        let outcome = match self.charge_once(&request).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(error = %err, "Gateway call failed; retrying once");
                self.charge_once(&request)
                    .await
                    .map_err(|e| ServiceError::PaymentGatewayTimeout(e.to_string()))?
            }
        };

        match outcome {
            ChargeOutcome::Approved { reference } => Ok(reference),
            ChargeOutcome::Declined { reason } => Err(ServiceError::PaymentFailed(reason)),
        }
    }

    /// One bounded gateway call; the deadline applies even if the adapter
    /// itself hangs.
    async fn charge_once(&self, request: &ChargeRequest) -> Result<ChargeOutcome, GatewayError> {
        match tokio::time::timeout(self.payment_timeout, self.gateway.create_charge(request)).await
        {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(self.payment_timeout)),
        }
    }

    /// Commits reservations, writes the order with its items, accounts the
    /// discount redemption and completes the attempt journal in one database
    /// transaction.
    async fn persist_order(
        &self,
        input: &PlaceOrder,
        snapshot: CartSnapshot,
        breakdown: &PriceBreakdown,
        application: Option<&DiscountApplication>,
        reservations: &[inventory_reservation::Model],
        payment_reference: &str,
    ) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;

        for reservation in reservations {
            self.inventory.commit(&txn, reservation.id).await?;
        }

        let order = self
            .orders
            .create_order_in_txn(
                &txn,
                CreateOrderInput {
                    user_id: input.user_id,
                    breakdown: breakdown.clone(),
                    currency: self.currency.clone(),
                    shipping_address: input.shipping_address.clone(),
                    payment_reference: payment_reference.to_string(),
                    discount_code: application.map(|a| a.code.clone()),
                    lines: snapshot.lines,
                },
            )
            .await?;

        if let Some(application) = application {
            self.discounts.redeem(&txn, application.code_id).await?;
            let applied = self
                .pricing
                .applied_value(breakdown.subtotal, application.effect);
            self.discounts
                .record_redemption(&txn, application.code_id, order.id, input.user_id, applied)
                .await?;
        }

        let attempt_update = checkout_attempt::ActiveModel {
            idempotency_key: Set(input.idempotency_key.clone()),
            status: Set(AttemptStatus::Completed.as_str().to_string()),
            order_id: Set(Some(order.id)),
            payment_reference: Set(Some(payment_reference.to_string())),
            updated_at: Set(Some(Utc::now())),
            ..Default::default()
        };
        attempt_update.update(&txn).await?;

        txn.commit().await?;
        Ok(order)
    }

    /// Resolves a pre-existing attempt for this key, if any.
    async fn resolve_prior_attempt(
        &self,
        input: &PlaceOrder,
        cart_hash: &str,
    ) -> Result<Option<CheckoutOutcome>, ServiceError> {
        let attempt = CheckoutAttemptEntity::find_by_id(input.idempotency_key.clone())
            .one(&*self.db)
            .await?;

        let Some(attempt) = attempt else {
            return Ok(None);
        };

        match attempt.status() {
            Some(AttemptStatus::Completed) => {
                if attempt.cart_hash != cart_hash {
                    return Err(ServiceError::IdempotencyConflict(
                        "This idempotency key was already used for a different cart".to_string(),
                    ));
                }
                let order_id = attempt.order_id.ok_or_else(|| {
                    ServiceError::InternalError(format!(
                        "Completed attempt {} has no order",
                        attempt.idempotency_key
                    ))
                })?;
                let order = OrderEntity::find_by_id(order_id)
                    .one(&*self.db)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::InternalError(format!("Order {} missing for completed attempt", order_id))
                    })?;
                Ok(Some(CheckoutOutcome {
                    order_id: order.id,
                    order_number: order.order_number,
                    status: order.status,
                    total: order.total,
                    replayed: true,
                }))
            }
            Some(AttemptStatus::InProgress) => Err(ServiceError::IdempotencyConflict(
                "A checkout with this idempotency key is already in progress".to_string(),
            )),
            Some(AttemptStatus::PaymentCapturedUnreconciled) => {
                Err(ServiceError::PaymentCapturedUnreconciled(
                    attempt.payment_reference.unwrap_or_default(),
                ))
            }
            // A failed attempt may be retried, possibly with a corrected
            // cart. The conditional flip lets exactly one concurrent retry
            // proceed.
            Some(AttemptStatus::Failed) => {
                let reset = CheckoutAttemptEntity::update_many()
                    .col_expr(
                        checkout_attempt::Column::CartHash,
                        sea_orm::sea_query::Expr::value(cart_hash),
                    )
                    .col_expr(
                        checkout_attempt::Column::Status,
                        sea_orm::sea_query::Expr::value(AttemptStatus::InProgress.as_str()),
                    )
                    .col_expr(
                        checkout_attempt::Column::ErrorKind,
                        sea_orm::sea_query::Expr::value(Option::<String>::None),
                    )
                    .col_expr(
                        checkout_attempt::Column::UpdatedAt,
                        sea_orm::sea_query::Expr::value(Some(Utc::now())),
                    )
                    .filter(
                        checkout_attempt::Column::IdempotencyKey.eq(&input.idempotency_key),
                    )
                    .filter(checkout_attempt::Column::Status.eq(AttemptStatus::Failed.as_str()))
                    .exec(&*self.db)
                    .await?;

                if reset.rows_affected == 0 {
                    return Err(ServiceError::IdempotencyConflict(
                        "A checkout with this idempotency key is already in progress".to_string(),
                    ));
                }
                Ok(None)
            }
            None => Err(ServiceError::InternalError(format!(
                "Attempt {} has unrecognized status",
                input.idempotency_key
            ))),
        }
    }

    /// Inserts the in-progress journal row. A concurrent submit with the
    /// same key loses the primary-key race and conflicts.
    async fn begin_attempt(&self, key: &str, cart_hash: &str) -> Result<(), ServiceError> {
        let existing = CheckoutAttemptEntity::find_by_id(key.to_string())
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            // resolve_prior_attempt already reset a failed row to in_progress
            return Ok(());
        }

        let now = Utc::now();
        let attempt = checkout_attempt::ActiveModel {
            idempotency_key: Set(key.to_string()),
            cart_hash: Set(cart_hash.to_string()),
            status: Set(AttemptStatus::InProgress.as_str().to_string()),
            order_id: Set(None),
            error_kind: Set(None),
            payment_reference: Set(None),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };
        attempt.insert(&*self.db).await.map_err(|_| {
            ServiceError::IdempotencyConflict(
                "A checkout with this idempotency key is already in progress".to_string(),
            )
        })?;
        Ok(())
    }

    /// Marks the journal row failed; only an in-progress row can fail.
    async fn mark_attempt_failed(&self, key: &str, error_kind: &str) {
        let result = CheckoutAttemptEntity::update_many()
            .col_expr(
                checkout_attempt::Column::Status,
                sea_orm::sea_query::Expr::value(AttemptStatus::Failed.as_str()),
            )
            .col_expr(
                checkout_attempt::Column::ErrorKind,
                sea_orm::sea_query::Expr::value(Some(error_kind)),
            )
            .col_expr(
                checkout_attempt::Column::UpdatedAt,
                sea_orm::sea_query::Expr::value(Some(Utc::now())),
            )
            .filter(checkout_attempt::Column::IdempotencyKey.eq(key))
            .filter(
                checkout_attempt::Column::Status.eq(AttemptStatus::InProgress.as_str()),
            )
            .exec(&*self.db)
            .await;

        if let Err(e) = result {
            error!(idempotency_key = %key, error = %e, "Failed to record attempt failure");
        }
    }

    /// Terminal alerting state: charge captured, order missing.
    async fn flag_unreconciled(&self, key: &str, payment_reference: &str, amount: Decimal) {
        let result = CheckoutAttemptEntity::update_many()
            .col_expr(
                checkout_attempt::Column::Status,
                sea_orm::sea_query::Expr::value(
                    AttemptStatus::PaymentCapturedUnreconciled.as_str(),
                ),
            )
            .col_expr(
                checkout_attempt::Column::PaymentReference,
                sea_orm::sea_query::Expr::value(Some(payment_reference)),
            )
            .col_expr(
                checkout_attempt::Column::UpdatedAt,
                sea_orm::sea_query::Expr::value(Some(Utc::now())),
            )
            .filter(checkout_attempt::Column::IdempotencyKey.eq(key))
            .exec(&*self.db)
            .await;

        if let Err(e) = result {
            // The journal write itself failed; the alert event below is the
            // remaining trail, so it must carry everything an operator needs.
            error!(
                idempotency_key = %key,
                payment_reference = %payment_reference,
                error = %e,
                "Failed to journal unreconciled payment"
            );
        }

        if let Err(e) = self
            .event_sender
            .send(Event::PaymentUnreconciled {
                idempotency_key: key.to_string(),
                payment_reference: payment_reference.to_string(),
                amount,
            })
            .await
        {
            error!(error = %e, "Failed to publish unreconciled payment alert");
        }
    }

    /// Best-effort compensation; failures are logged, never masked over the
    /// original error.
    async fn release_all(&self, reservations: &[inventory_reservation::Model]) {
        for reservation in reservations {
            if let Err(e) = self.inventory.release(reservation.id).await {
                error!(
                    reservation_id = %reservation.id,
                    error = %e,
                    "Failed to release reservation during rollback"
                );
            }
        }
    }

    async fn publish_success_events(
        &self,
        order: &order::Model,
        application: Option<&DiscountApplication>,
        breakdown: &PriceBreakdown,
    ) {
        if let Err(e) = self.event_sender.send(Event::OrderCreated(order.id)).await {
            warn!(error = %e, "Failed to publish order created event");
        }

        if let Some(reference) = &order.payment_reference {
            if let Err(e) = self
                .event_sender
                .send(Event::PaymentCaptured {
                    order_id: order.id,
                    reference: reference.clone(),
                    amount: order.total,
                })
                .await
            {
                warn!(error = %e, "Failed to publish payment captured event");
            }
        }

        if let Some(application) = application {
            let applied = self
                .pricing
                .applied_value(breakdown.subtotal, application.effect);
            if let Err(e) = self
                .event_sender
                .send(Event::DiscountRedeemed {
                    discount_code_id: application.code_id,
                    order_id: order.id,
                    amount_applied: applied,
                })
                .await
            {
                warn!(error = %e, "Failed to publish redemption event");
            }
        }
    }
}

fn validate_submission(input: &PlaceOrder) -> Result<(), ServiceError> {
    if input.idempotency_key.trim().is_empty() {
        return Err(ServiceError::ValidationError(
            "An idempotency key is required".to_string(),
        ));
    }
    if input.lines.is_empty() {
        return Err(ServiceError::ValidationError("Cart is empty".to_string()));
    }
    if input.lines.iter().any(|l| l.quantity <= 0) {
        return Err(ServiceError::ValidationError(
            "Line quantities must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Canonical fingerprint of a submission: same cart in any line order hashes
/// the same, any material change (quantities, code, user) hashes differently.
fn fingerprint(input: &PlaceOrder) -> String {
    let mut lines: Vec<(Uuid, i32)> = input
        .lines
        .iter()
        .map(|l| (l.product_id, l.quantity))
        .collect();
    lines.sort();

    let mut hasher = Sha256::new();
    for (product_id, quantity) in &lines {
        hasher.update(product_id.as_bytes());
        hasher.update(quantity.to_be_bytes());
    }
    if let Some(code) = &input.discount_code {
        hasher.update(code.trim().to_uppercase().as_bytes());
    }
    if let Some(user) = &input.user_id {
        hasher.update(user.as_bytes());
    }

    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(lines: Vec<CartLine>, code: Option<&str>) -> PlaceOrder {
        PlaceOrder {
            idempotency_key: "key-1".to_string(),
            user_id: None,
            lines,
            shipping_address: serde_json::json!({"city": "Portland"}),
            discount_code: code.map(String::from),
        }
    }

    #[test]
    fn fingerprint_ignores_line_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let first = fingerprint(&submission(
            vec![
                CartLine { product_id: a, quantity: 1 },
                CartLine { product_id: b, quantity: 2 },
            ],
            None,
        ));
        let second = fingerprint(&submission(
            vec![
                CartLine { product_id: b, quantity: 2 },
                CartLine { product_id: a, quantity: 1 },
            ],
            None,
        ));

        assert_eq!(first, second);
    }

    #[test]
    fn fingerprint_detects_material_changes() {
        let a = Uuid::new_v4();
        let base = submission(vec![CartLine { product_id: a, quantity: 1 }], None);

        let more = submission(vec![CartLine { product_id: a, quantity: 2 }], None);
        assert_ne!(fingerprint(&base), fingerprint(&more));

        let with_code = submission(vec![CartLine { product_id: a, quantity: 1 }], Some("SAVE10"));
        assert_ne!(fingerprint(&base), fingerprint(&with_code));
    }

    #[test]
    fn fingerprint_normalizes_code_case() {
        let a = Uuid::new_v4();
        let upper = submission(vec![CartLine { product_id: a, quantity: 1 }], Some("SAVE10"));
        let lower = submission(vec![CartLine { product_id: a, quantity: 1 }], Some("save10"));
        assert_eq!(fingerprint(&upper), fingerprint(&lower));
    }

    #[test]
    fn empty_cart_is_rejected() {
        let err = validate_submission(&submission(vec![], None)).unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let err = validate_submission(&submission(
            vec![CartLine { product_id: Uuid::new_v4(), quantity: 0 }],
            None,
        ))
        .unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }
}
