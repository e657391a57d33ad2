use super::common::JsonBody;
use crate::{auth::AuthUser, errors::ServiceError, services::carts::Cart, AppState};
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartRequest {
    /// Product id to quantity; non-positive quantities remove the entry
    #[schema(value_type = Object)]
    pub cart_items: BTreeMap<String, i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CartResponse {
    pub success: bool,
    #[schema(value_type = Object)]
    pub cart_items: Cart,
}

/// Replace the caller's cart
#[utoipa::path(
    post,
    path = "/api/cart/update",
    request_body = UpdateCartRequest,
    responses(
        (status = 200, description = "Cart updated", body = CartResponse),
        (status = 400, description = "Invalid cart", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "Cart"
)]
pub async fn update_cart(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(request): JsonBody<UpdateCartRequest>,
) -> Result<Json<CartResponse>, ServiceError> {
    let cart_items = state
        .services
        .carts
        .update_cart(user.user_id, &request.cart_items)
        .await?;
    Ok(Json(CartResponse {
        success: true,
        cart_items,
    }))
}
