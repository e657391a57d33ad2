use axum::{routing::get, Json, Router};
use utoipa::OpenApi;

use crate::handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "1.0.0",
        description = r#"
# Storefront API

Customer accounts, catalog, carts, address book and the order workflow for a single-seller
storefront. Orders are placed either cash-on-delivery or through a hosted checkout page; the
payment gateway reports the outcome on a signed webhook.

## Authentication

Customer endpoints accept the `token` cookie set by `/api/user/login` or an
`Authorization: Bearer <token>` header. Seller endpoints use the `sellerToken` cookie.

## Error Handling

Every failure uses the same body with the matching HTTP status code:

```json
{
  "success": false,
  "message": "Please add address and items",
  "request_id": "…",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
"#
    ),
    paths(
        handlers::health::health_check,
        handlers::users::register,
        handlers::users::login,
        handlers::users::current_user,
        handlers::users::logout,
        handlers::seller::seller_login,
        handlers::seller::seller_auth,
        handlers::seller::seller_logout,
        handlers::products::add_product,
        handlers::products::list_products,
        handlers::products::product_by_id,
        handlers::products::change_stock,
        handlers::cart::update_cart,
        handlers::addresses::add_address,
        handlers::addresses::list_addresses,
        handlers::orders::place_cod_order,
        handlers::orders::place_online_order,
        handlers::orders::user_orders,
        handlers::orders::seller_orders,
        handlers::payment_webhooks::payment_webhook,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::entities::order::PaymentType,
        crate::services::catalog::CreateProductRequest,
        crate::services::catalog::ProductResponse,
        crate::services::addresses::AddressInput,
        crate::services::users::RegisterRequest,
        crate::services::users::LoginRequest,
        crate::services::users::UserProfile,
        crate::services::orders::OrderItemInput,
        crate::services::orders::PlaceOrderRequest,
        crate::services::orders::OrderItemView,
        crate::services::orders::OrderView,
        handlers::common::MessageResponse,
        handlers::health::ComponentStatus,
        handlers::health::HealthResponse,
        handlers::users::SessionResponse,
        handlers::users::ProfileResponse,
        handlers::seller::SellerLoginRequest,
        handlers::seller::SellerSessionResponse,
        handlers::products::ProductEnvelope,
        handlers::products::ProductListResponse,
        handlers::products::ProductIdRequest,
        handlers::products::StockUpdateRequest,
        handlers::cart::UpdateCartRequest,
        handlers::cart::CartResponse,
        handlers::addresses::AddAddressRequest,
        handlers::addresses::AddressEnvelope,
        handlers::addresses::AddressListResponse,
        handlers::orders::OrderPlacedResponse,
        handlers::orders::CheckoutStartedResponse,
        handlers::orders::OrderListResponse,
        handlers::payment_webhooks::WebhookAck,
    )),
    tags(
        (name = "Health", description = "Liveness and readiness"),
        (name = "Users", description = "Customer accounts and sessions"),
        (name = "Seller", description = "Operator session"),
        (name = "Products", description = "Catalog"),
        (name = "Cart", description = "Per-user cart"),
        (name = "Addresses", description = "Address book"),
        (name = "Orders", description = "Order placement and history"),
        (name = "Payments", description = "Payment gateway notifications"),
    )
)]
pub struct ApiDoc;

/// Serves the generated document at `/api-docs/openapi.json`
pub fn openapi_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDoc::openapi()) }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_order_and_webhook_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/order/cod",
            "/api/order/stripe",
            "/api/order/user",
            "/api/order/seller",
            "/api/order/webhook",
            "/health",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
