use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "1.0.0",
        description = r#"
# Storefront Checkout API

The transactional core of an e-commerce storefront: order placement,
inventory reservations, discount validation and redemption, and
server-authoritative pricing.

## Error Handling

Every failing endpoint returns a typed error body:

```json
{
  "kind": "insufficient_stock",
  "message": "Insufficient stock: this item just sold out",
  "timestamp": "2025-06-09T10:30:00Z"
}
```

## Idempotency

`POST /checkout` requires a client-supplied idempotency key. Replaying the
same key with the same cart returns the original order instead of
re-reserving stock or charging again; reusing a key for a different cart is
rejected with `409 idempotency_conflict`.

## Pagination

List endpoints accept `page` and `per_page` query parameters.
        "#,
        contact(
            name = "Storefront Engineering",
            email = "eng@storefront.example"
        ),
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080/api/v1", description = "Local development")
    ),
    tags(
        (name = "checkout", description = "Order placement and price quotes"),
        (name = "orders", description = "Order reads and fulfillment transitions"),
        (name = "products", description = "Published catalog reads"),
        (name = "discounts", description = "Discount code administration"),
        (name = "inventory", description = "Reservation operations")
    ),
    paths(
        // Checkout
        crate::handlers::checkout::place_order,
        crate::handlers::checkout::quote_cart,

        // Orders
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::get_order_items,
        crate::handlers::orders::update_order_status,

        // Products
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,

        // Discounts
        crate::handlers::discounts::create_discount,
        crate::handlers::discounts::list_discounts,
        crate::handlers::discounts::update_discount,
        crate::handlers::discounts::toggle_discount,

        // Inventory
        crate::handlers::inventory::list_reservations,
        crate::handlers::inventory::cleanup_reservations,
    ),
    components(
        schemas(
            // Checkout types
            crate::handlers::checkout::CheckoutRequest,
            crate::handlers::checkout::CartLineRequest,
            crate::handlers::checkout::AddressRequest,
            crate::handlers::checkout::QuoteRequest,
            crate::services::checkout::CheckoutOutcome,
            crate::services::pricing::PriceBreakdown,

            // Order types
            crate::services::orders::OrderResponse,
            crate::handlers::orders::OrderItemResponse,
            crate::handlers::orders::UpdateOrderStatusRequest,

            // Product types
            crate::handlers::products::ProductResponse,

            // Discount types
            crate::services::discounts::CreateDiscountCode,
            crate::services::discounts::UpdateDiscountCode,
            crate::handlers::discounts::DiscountCodeResponse,
            crate::handlers::discounts::ToggleRequest,

            // Inventory types
            crate::services::inventory::ReservationSummary,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
