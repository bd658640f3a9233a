//! Discount Validator
//!
//! Decides whether a code is usable for a given cart and user, computes its
//! effect, and accounts for redemptions. Validation never mutates the usage
//! counter; `redeem` runs only after the owning order's payment is confirmed,
//! so abandoned checkouts cannot burn usage.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::discount_code::{self, DiscountType, Entity as DiscountCodeEntity};
use crate::entities::discount_redemption::{self, Entity as DiscountRedemptionEntity};
use crate::errors::ServiceError;
use crate::services::pricing::DiscountEffect;

/// A validated, applicable discount ready for pricing.
#[derive(Debug, Clone)]
pub struct DiscountApplication {
    pub code_id: Uuid,
    pub code: String,
    pub effect: DiscountEffect,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateDiscountCode {
    #[validate(length(min = 1, max = 64, message = "Code must be between 1 and 64 characters"))]
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    #[serde(default)]
    pub min_purchase_amount: Decimal,
    pub max_discount_amount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    #[serde(default = "default_per_user_limit")]
    pub per_user_limit: i32,
    pub valid_from: Option<chrono::DateTime<Utc>>,
    pub valid_until: Option<chrono::DateTime<Utc>>,
    #[serde(default = "default_is_active")]
    pub is_active: bool,
}

fn default_per_user_limit() -> i32 {
    1
}

fn default_is_active() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateDiscountCode {
    pub description: Option<String>,
    pub discount_value: Option<Decimal>,
    pub min_purchase_amount: Option<Decimal>,
    pub max_discount_amount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub per_user_limit: Option<i32>,
    pub valid_until: Option<chrono::DateTime<Utc>>,
    pub is_active: Option<bool>,
}

/// Service for validating, redeeming and administering discount codes.
#[derive(Clone)]
pub struct DiscountService {
    db: Arc<DatabaseConnection>,
}

impl DiscountService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Validates a code for a cart subtotal and optional user.
    ///
    /// Checks run in order and short-circuit on the first failure: existence
    /// and active flag, validity window, minimum purchase, global usage cap,
    /// per-user cap. Guests are exempt from the per-user check.
    #[instrument(skip(self))]
    pub async fn validate(
        &self,
        code: &str,
        cart_subtotal: Decimal,
        user_id: Option<Uuid>,
    ) -> Result<DiscountApplication, ServiceError> {
        let normalized = normalize_code(code);
        let db = &*self.db;
        let now = Utc::now();

        let discount = DiscountCodeEntity::find()
            .filter(discount_code::Column::Code.eq(normalized.clone()))
            .filter(discount_code::Column::IsActive.eq(true))
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::CodeNotFound(normalized.clone()))?;

        if now < discount.valid_from {
            return Err(ServiceError::CodeNotYetActive(normalized));
        }
        if matches!(discount.valid_until, Some(until) if now > until) {
            return Err(ServiceError::CodeExpired(normalized));
        }

        if cart_subtotal < discount.min_purchase_amount {
            return Err(ServiceError::MinimumNotMet(format!(
                "code {} requires a minimum purchase of {}",
                normalized, discount.min_purchase_amount
            )));
        }

        if discount.usage_exhausted() {
            return Err(ServiceError::UsageLimitExceeded(normalized));
        }

        if let Some(user) = user_id {
            if discount.per_user_limit > 0 {
                let past = DiscountRedemptionEntity::find()
                    .filter(discount_redemption::Column::DiscountCodeId.eq(discount.id))
                    .filter(discount_redemption::Column::UserId.eq(user))
                    .count(db)
                    .await?;
                if past >= discount.per_user_limit as u64 {
                    return Err(ServiceError::PerUserLimitExceeded(normalized));
                }
            }
        }

        let effect = compute_effect(&discount, cart_subtotal)?;

        Ok(DiscountApplication {
            code_id: discount.id,
            code: discount.code,
            effect,
        })
    }

    /// Advances the usage counter by one, guarded against the usage limit.
    ///
    /// Single conditional UPDATE so concurrent checkouts cannot over-redeem:
    /// `SET usage_count = usage_count + 1 WHERE id = ? AND (usage_limit IS
    /// NULL OR usage_count < usage_limit)`. Zero rows affected on a code that
    /// exists means the cap was hit by a racing checkout.
    pub async fn redeem<C: ConnectionTrait>(
        &self,
        conn: &C,
        discount_id: Uuid,
    ) -> Result<(), ServiceError> {
        let result = DiscountCodeEntity::update_many()
            .col_expr(
                discount_code::Column::UsageCount,
                Expr::col(discount_code::Column::UsageCount).add(1),
            )
            .col_expr(
                discount_code::Column::UpdatedAt,
                Expr::value(Some(Utc::now())),
            )
            .filter(discount_code::Column::Id.eq(discount_id))
            .filter(
                Condition::any()
                    .add(discount_code::Column::UsageLimit.is_null())
                    .add(
                        Expr::col(discount_code::Column::UsageCount)
                            .lt(Expr::col(discount_code::Column::UsageLimit)),
                    ),
            )
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            let exists = DiscountCodeEntity::find_by_id(discount_id).one(conn).await?;
            return match exists {
                Some(code) => {
                    warn!(code = %code.code, "Usage limit reached during redemption race");
                    Err(ServiceError::UsageLimitExceeded(code.code))
                }
                None => Err(ServiceError::NotFound(format!(
                    "Discount code {} not found",
                    discount_id
                ))),
            };
        }

        Ok(())
    }

    /// Returns one usage to the counter; compensation for a redemption whose
    /// enclosing work was rolled back.
    pub async fn unredeem<C: ConnectionTrait>(
        &self,
        conn: &C,
        discount_id: Uuid,
    ) -> Result<(), ServiceError> {
        DiscountCodeEntity::update_many()
            .col_expr(
                discount_code::Column::UsageCount,
                Expr::col(discount_code::Column::UsageCount).sub(1),
            )
            .filter(discount_code::Column::Id.eq(discount_id))
            .filter(discount_code::Column::UsageCount.gt(0))
            .exec(conn)
            .await?;
        Ok(())
    }

    /// Records the one-time application of a code to a confirmed order.
    pub async fn record_redemption<C: ConnectionTrait>(
        &self,
        conn: &C,
        discount_id: Uuid,
        order_id: Uuid,
        user_id: Option<Uuid>,
        amount_applied: Decimal,
    ) -> Result<discount_redemption::Model, ServiceError> {
        let redemption = discount_redemption::ActiveModel {
            id: Set(Uuid::new_v4()),
            discount_code_id: Set(discount_id),
            order_id: Set(order_id),
            user_id: Set(user_id),
            amount_applied: Set(amount_applied),
            redeemed_at: Set(Utc::now()),
        };
        Ok(redemption.insert(conn).await?)
    }

    /// Creates a new discount code (admin surface).
    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create_code(
        &self,
        input: CreateDiscountCode,
    ) -> Result<discount_code::Model, ServiceError> {
        input.validate()?;

        if input.discount_type == DiscountType::Percentage
            && (input.discount_value <= Decimal::ZERO || input.discount_value > Decimal::from(100))
        {
            return Err(ServiceError::ValidationError(
                "Percentage discounts must be between 0 and 100".to_string(),
            ));
        }
        if input.discount_type == DiscountType::Fixed && input.discount_value <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Fixed discounts must be greater than zero".to_string(),
            ));
        }

        let normalized = normalize_code(&input.code);
        let db = &*self.db;

        let existing = DiscountCodeEntity::find()
            .filter(discount_code::Column::Code.eq(normalized.clone()))
            .one(db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::InvalidOperation(format!(
                "Discount code {} already exists",
                normalized
            )));
        }

        let now = Utc::now();
        let model = discount_code::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(normalized.clone()),
            description: Set(input.description),
            discount_type: Set(input.discount_type.as_str().to_string()),
            discount_value: Set(input.discount_value),
            min_purchase_amount: Set(input.min_purchase_amount),
            max_discount_amount: Set(input.max_discount_amount),
            usage_limit: Set(input.usage_limit),
            usage_count: Set(0),
            per_user_limit: Set(input.per_user_limit),
            valid_from: Set(input.valid_from.unwrap_or(now)),
            valid_until: Set(input.valid_until),
            is_active: Set(input.is_active),
            created_at: Set(now),
            updated_at: Set(None),
        };

        let created = model.insert(db).await?;
        info!(code = %normalized, "Discount code created");
        Ok(created)
    }

    /// Lists codes, newest first.
    pub async fn list_codes(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<discount_code::Model>, u64), ServiceError> {
        if page == 0 {
            return Err(ServiceError::ValidationError(
                "Page number must be greater than 0".to_string(),
            ));
        }

        let db = &*self.db;
        let paginator = DiscountCodeEntity::find()
            .order_by_desc(discount_code::Column::CreatedAt)
            .paginate(db, limit.clamp(1, 100));

        let total = paginator.num_items().await?;
        let codes = paginator.fetch_page(page - 1).await?;

        Ok((codes, total))
    }

    /// Applies a partial update to a code's rules.
    #[instrument(skip(self, input))]
    pub async fn update_code(
        &self,
        id: Uuid,
        input: UpdateDiscountCode,
    ) -> Result<discount_code::Model, ServiceError> {
        input.validate()?;
        let db = &*self.db;

        let existing = DiscountCodeEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Discount code {} not found", id)))?;

        let mut active: discount_code::ActiveModel = existing.into();
        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        if let Some(value) = input.discount_value {
            active.discount_value = Set(value);
        }
        if let Some(min) = input.min_purchase_amount {
            active.min_purchase_amount = Set(min);
        }
        if let Some(max) = input.max_discount_amount {
            active.max_discount_amount = Set(Some(max));
        }
        if let Some(limit) = input.usage_limit {
            active.usage_limit = Set(Some(limit));
        }
        if let Some(per_user) = input.per_user_limit {
            active.per_user_limit = Set(per_user);
        }
        if let Some(until) = input.valid_until {
            active.valid_until = Set(Some(until));
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Some(Utc::now()));

        Ok(active.update(db).await?)
    }

    /// Flips the active flag (admin toggle).
    pub async fn set_active(
        &self,
        id: Uuid,
        is_active: bool,
    ) -> Result<discount_code::Model, ServiceError> {
        let db = &*self.db;
        let existing = DiscountCodeEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Discount code {} not found", id)))?;

        let mut active: discount_code::ActiveModel = existing.into();
        active.is_active = Set(is_active);
        active.updated_at = Set(Some(Utc::now()));

        Ok(active.update(db).await?)
    }
}

fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Computes the effect of a code against a subtotal.
///
/// `buy_x_get_y` is storable but not redeemable: the computation rule is
/// undefined, so rejecting it beats guessing at semantics with money.
pub(crate) fn compute_effect(
    discount: &discount_code::Model,
    subtotal: Decimal,
) -> Result<DiscountEffect, ServiceError> {
    let kind = discount
        .discount_type()
        .ok_or_else(|| ServiceError::UnsupportedDiscountType(discount.discount_type.clone()))?;

    let effect = match kind {
        DiscountType::Percentage => {
            let mut amount = (subtotal * discount.discount_value / Decimal::from(100)).round_dp(2);
            if let Some(cap) = discount.max_discount_amount {
                amount = amount.min(cap);
            }
            DiscountEffect::AmountOff(amount)
        }
        DiscountType::Fixed => DiscountEffect::AmountOff(discount.discount_value.min(subtotal)),
        DiscountType::FreeShipping => DiscountEffect::FreeShipping,
        DiscountType::BuyXGetY => {
            return Err(ServiceError::UnsupportedDiscountType(
                discount.discount_type.clone(),
            ))
        }
    };

    Ok(effect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn model(discount_type: &str, value: Decimal) -> discount_code::Model {
        discount_code::Model {
            id: Uuid::new_v4(),
            code: "TEST10".to_string(),
            description: None,
            discount_type: discount_type.to_string(),
            discount_value: value,
            min_purchase_amount: Decimal::ZERO,
            max_discount_amount: None,
            usage_limit: None,
            usage_count: 0,
            per_user_limit: 1,
            valid_from: Utc::now(),
            valid_until: Some(Utc::now() + Duration::days(30)),
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn percentage_discount() {
        // $100 order with 10% discount = $10 off
        let effect = compute_effect(&model("percentage", dec!(10)), dec!(100)).unwrap();
        assert_eq!(effect, DiscountEffect::AmountOff(dec!(10.00)));
    }

    #[test]
    fn percentage_discount_respects_cap() {
        let mut promo = model("percentage", dec!(50));
        promo.max_discount_amount = Some(dec!(25));
        let effect = compute_effect(&promo, dec!(200)).unwrap();
        assert_eq!(effect, DiscountEffect::AmountOff(dec!(25)));
    }

    #[test]
    fn fixed_discount_clamped_to_subtotal() {
        let effect = compute_effect(&model("fixed", dec!(20)), dec!(100)).unwrap();
        assert_eq!(effect, DiscountEffect::AmountOff(dec!(20)));

        let effect = compute_effect(&model("fixed", dec!(20)), dec!(12.50)).unwrap();
        assert_eq!(effect, DiscountEffect::AmountOff(dec!(12.50)));
    }

    #[test]
    fn free_shipping_is_a_marker() {
        let effect = compute_effect(&model("free_shipping", dec!(0)), dec!(100)).unwrap();
        assert_eq!(effect, DiscountEffect::FreeShipping);
    }

    #[test]
    fn buy_x_get_y_is_rejected() {
        let err = compute_effect(&model("buy_x_get_y", dec!(1)), dec!(100)).unwrap_err();
        assert_eq!(err.kind(), "unsupported_discount_type");
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = compute_effect(&model("loyalty_points", dec!(1)), dec!(100)).unwrap_err();
        assert_eq!(err.kind(), "unsupported_discount_type");
    }
}
