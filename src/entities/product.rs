use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Publication status for catalog products
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductStatus {
    Published,
    Draft,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Published => "published",
            ProductStatus::Draft => "draft",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "published" => Some(ProductStatus::Published),
            "draft" => Some(ProductStatus::Draft),
            _ => None,
        }
    }
}

/// Product entity
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Product name
    #[validate(length(
        min = 1,
        max = 255,
        message = "Product name must be between 1 and 255 characters"
    ))]
    pub name: String,

    /// Product description
    #[validate(length(max = 2000, message = "Description cannot exceed 2000 characters"))]
    pub description: Option<String>,

    /// SKU (Stock Keeping Unit)
    #[validate(length(
        min = 1,
        max = 100,
        message = "SKU must be between 1 and 100 characters"
    ))]
    pub sku: String,

    /// Base unit price
    pub price: Decimal,

    /// Promotional price; takes precedence over `price` when set
    pub sale_price: Option<Decimal>,

    /// Units on hand; never negative, mutated only by ledger operations
    pub stock_quantity: i32,

    /// Units held by active reservations against this product
    pub reserved_quantity: i32,

    /// "published" or "draft"; only published products are sellable
    pub status: String,

    /// Variant attributes snapshotted onto order items at purchase
    pub size: Option<String>,
    pub color: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItem,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Units still offerable to new reservations.
    pub fn available(&self) -> i32 {
        self.stock_quantity - self.reserved_quantity
    }

    /// Effective unit price, sale-aware.
    pub fn unit_price(&self) -> Decimal {
        self.sale_price.unwrap_or(self.price)
    }

    pub fn is_published(&self) -> bool {
        self.status == ProductStatus::Published.as_str()
    }
}
