pub mod checkout;
pub mod common;
pub mod discounts;
pub mod inventory;
pub mod orders;
pub mod products;

use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::checkout::CheckoutService;
use crate::services::discounts::DiscountService;
use crate::services::inventory::InventoryService;
use crate::services::orders::OrderService;
use crate::services::payments::PaymentGateway;
use crate::services::pricing::{PricingConfig, PricingService};

/// Container for the services the HTTP handlers depend on.
#[derive(Clone)]
pub struct AppServices {
    pub inventory: Arc<InventoryService>,
    pub discounts: Arc<DiscountService>,
    pub orders: Arc<OrderService>,
    pub checkout: Arc<CheckoutService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: EventSender,
        gateway: Arc<dyn PaymentGateway>,
        cfg: &AppConfig,
    ) -> Self {
        let inventory = Arc::new(InventoryService::new(
            db_pool.clone(),
            event_sender.clone(),
            cfg.reservation_ttl_minutes,
        ));
        let discounts = Arc::new(DiscountService::new(db_pool.clone()));
        let orders = Arc::new(OrderService::new(db_pool.clone(), event_sender.clone()));
        let pricing = PricingService::new(PricingConfig::from_app_config(cfg));

        let checkout = Arc::new(CheckoutService::new(
            db_pool,
            inventory.clone(),
            discounts.clone(),
            pricing,
            orders.clone(),
            gateway,
            event_sender,
            cfg.currency.clone(),
            Duration::from_secs(cfg.payment_timeout_secs),
        ));

        Self {
            inventory,
            discounts,
            orders,
            checkout,
        }
    }
}
