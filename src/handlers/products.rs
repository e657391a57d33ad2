use super::common::JsonBody;
use crate::{
    auth::SellerUser,
    errors::ServiceError,
    services::catalog::{CreateProductRequest, ProductResponse},
    AppState,
};
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductEnvelope {
    pub success: bool,
    pub product: ProductResponse,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductListResponse {
    pub success: bool,
    pub products: Vec<ProductResponse>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProductIdRequest {
    pub id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StockUpdateRequest {
    pub id: Uuid,
    pub in_stock: bool,
}

/// Add a product to the catalog
#[utoipa::path(
    post,
    path = "/api/product/add",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product added", body = ProductEnvelope),
        (status = 400, description = "Invalid product", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn add_product(
    State(state): State<AppState>,
    _seller: SellerUser,
    JsonBody(request): JsonBody<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductEnvelope>), ServiceError> {
    let product = state.services.products.add_product(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ProductEnvelope {
            success: true,
            product,
        }),
    ))
}

/// List the catalog, newest first
#[utoipa::path(
    get,
    path = "/api/product/list",
    responses((status = 200, description = "Products", body = ProductListResponse)),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<ProductListResponse>, ServiceError> {
    let products = state.services.products.list_products().await?;
    Ok(Json(ProductListResponse {
        success: true,
        products,
    }))
}

/// Fetch one product
#[utoipa::path(
    post,
    path = "/api/product/id",
    request_body = ProductIdRequest,
    responses(
        (status = 200, description = "Product", body = ProductEnvelope),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn product_by_id(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<ProductIdRequest>,
) -> Result<Json<ProductEnvelope>, ServiceError> {
    let product = state.services.products.get_product(request.id).await?;
    Ok(Json(ProductEnvelope {
        success: true,
        product,
    }))
}

/// Mark a product in or out of stock
#[utoipa::path(
    post,
    path = "/api/product/stock",
    request_body = StockUpdateRequest,
    responses(
        (status = 200, description = "Stock updated", body = ProductEnvelope),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn change_stock(
    State(state): State<AppState>,
    _seller: SellerUser,
    JsonBody(request): JsonBody<StockUpdateRequest>,
) -> Result<Json<ProductEnvelope>, ServiceError> {
    let product = state
        .services
        .products
        .set_stock(request.id, request.in_stock)
        .await?;
    Ok(Json(ProductEnvelope {
        success: true,
        product,
    }))
}
