use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Tagged discount computation rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Fixed,
    FreeShipping,
    BuyXGetY,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "percentage",
            DiscountType::Fixed => "fixed",
            DiscountType::FreeShipping => "free_shipping",
            DiscountType::BuyXGetY => "buy_x_get_y",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "percentage" => Some(DiscountType::Percentage),
            "fixed" => Some(DiscountType::Fixed),
            "free_shipping" => Some(DiscountType::FreeShipping),
            "buy_x_get_y" => Some(DiscountType::BuyXGetY),
            _ => None,
        }
    }
}

/// Discount code entity
///
/// Codes are stored uppercase and matched case-insensitively. The usage
/// counter is advanced only through the conditional update in
/// `DiscountService::redeem`, never by plain writes.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "discount_codes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Unique code, uppercase
    #[validate(length(min = 1, max = 64, message = "Code must be between 1 and 64 characters"))]
    pub code: String,

    pub description: Option<String>,

    /// "percentage", "fixed", "free_shipping" or "buy_x_get_y"
    pub discount_type: String,

    /// Percentage points or fixed amount depending on type
    pub discount_value: Decimal,

    /// Carts below this subtotal cannot use the code
    pub min_purchase_amount: Decimal,

    /// Upper bound for percentage discounts
    pub max_discount_amount: Option<Decimal>,

    /// Global redemption cap; None means unlimited
    pub usage_limit: Option<i32>,

    /// Confirmed redemptions so far
    pub usage_count: i32,

    /// Redemption cap per authenticated user; 0 disables the check
    pub per_user_limit: i32,

    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::discount_redemption::Entity")]
    DiscountRedemption,
}

impl Related<super::discount_redemption::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DiscountRedemption.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn discount_type(&self) -> Option<DiscountType> {
        DiscountType::from_str(&self.discount_type)
    }

    /// True when `now` falls inside `[valid_from, valid_until]`.
    pub fn is_within_window(&self, now: DateTime<Utc>) -> bool {
        if now < self.valid_from {
            return false;
        }
        match self.valid_until {
            Some(until) => now <= until,
            None => true,
        }
    }

    pub fn usage_exhausted(&self) -> bool {
        matches!(self.usage_limit, Some(limit) if self.usage_count >= limit)
    }
}
