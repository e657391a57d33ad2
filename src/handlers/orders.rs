use super::common::{request_origin, JsonBody};
use crate::{
    auth::{AuthUser, SellerUser},
    errors::ServiceError,
    services::orders::{OrderView, PlaceOrderRequest},
    AppState,
};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderPlacedResponse {
    pub success: bool,
    pub message: String,
    pub order: OrderView,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CheckoutStartedResponse {
    pub success: bool,
    pub message: String,
    /// Hosted checkout page to redirect the customer to
    pub url: String,
    pub order: OrderView,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderListResponse {
    pub success: bool,
    pub orders: Vec<OrderView>,
}

/// Place a cash-on-delivery order
#[utoipa::path(
    post,
    path = "/api/order/cod",
    request_body = PlaceOrderRequest,
    responses(
        (status = 201, description = "Order placed", body = OrderPlacedResponse),
        (status = 400, description = "Missing address or items", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse),
        (status = 409, description = "Product out of stock", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn place_cod_order(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(request): JsonBody<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderPlacedResponse>), ServiceError> {
    let order = state
        .services
        .orders
        .place_cod_order(user.user_id, &request)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(OrderPlacedResponse {
            success: true,
            message: "Order Placed Successfully".to_string(),
            order,
        }),
    ))
}

/// Place an online order and open a hosted checkout session
#[utoipa::path(
    post,
    path = "/api/order/stripe",
    request_body = PlaceOrderRequest,
    responses(
        (status = 201, description = "Checkout session created", body = CheckoutStartedResponse),
        (status = 400, description = "Missing address, items or origin", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse),
        (status = 409, description = "Product out of stock", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment gateway failure", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn place_online_order(
    State(state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
    JsonBody(request): JsonBody<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<CheckoutStartedResponse>), ServiceError> {
    let origin = request_origin(&headers);
    let checkout = state
        .services
        .orders
        .place_online_order(user.user_id, &request, origin.as_deref())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CheckoutStartedResponse {
            success: true,
            message: "Redirecting to payment...".to_string(),
            url: checkout.url,
            order: checkout.order,
        }),
    ))
}

/// The caller's orders, newest first
#[utoipa::path(
    get,
    path = "/api/order/user",
    responses(
        (status = 200, description = "Orders retrieved", body = OrderListResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn user_orders(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<OrderListResponse>, ServiceError> {
    let orders = state.services.orders.list_user_orders(user.user_id).await?;
    Ok(Json(OrderListResponse {
        success: true,
        orders,
    }))
}

/// All customers' orders for the operator
#[utoipa::path(
    get,
    path = "/api/order/seller",
    responses(
        (status = 200, description = "Orders retrieved", body = OrderListResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn seller_orders(
    State(state): State<AppState>,
    _seller: SellerUser,
) -> Result<Json<OrderListResponse>, ServiceError> {
    let orders = state.services.orders.list_all_orders().await?;
    Ok(Json(OrderListResponse {
        success: true,
        orders,
    }))
}
