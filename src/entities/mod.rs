pub mod checkout_attempt;
pub mod discount_code;
pub mod discount_redemption;
pub mod inventory_reservation;
pub mod order;
pub mod order_item;
pub mod product;

pub use checkout_attempt::Entity as CheckoutAttempt;
pub use discount_code::Entity as DiscountCode;
pub use discount_redemption::Entity as DiscountRedemption;
pub use inventory_reservation::Entity as InventoryReservation;
pub use order::Entity as Order;
pub use order_item::Entity as OrderItem;
pub use product::Entity as Product;
