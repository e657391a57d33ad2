use super::common::JsonBody;
use crate::{
    auth::AuthUser, entities::address, errors::ServiceError,
    services::addresses::AddressInput, AppState,
};
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddAddressRequest {
    pub address: AddressInput,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AddressEnvelope {
    pub success: bool,
    #[schema(value_type = Object)]
    pub address: address::Model,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AddressListResponse {
    pub success: bool,
    #[schema(value_type = Vec<Object>)]
    pub addresses: Vec<address::Model>,
}

/// Save a shipping address
#[utoipa::path(
    post,
    path = "/api/address/add",
    request_body = AddAddressRequest,
    responses(
        (status = 201, description = "Address added", body = AddressEnvelope),
        (status = 400, description = "Invalid address", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "Addresses"
)]
pub async fn add_address(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(request): JsonBody<AddAddressRequest>,
) -> Result<(StatusCode, Json<AddressEnvelope>), ServiceError> {
    let address = state
        .services
        .addresses
        .add_address(user.user_id, request.address)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(AddressEnvelope {
            success: true,
            address,
        }),
    ))
}

/// The caller's saved addresses
#[utoipa::path(
    get,
    path = "/api/address/get",
    responses(
        (status = 200, description = "Addresses", body = AddressListResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "Addresses"
)]
pub async fn list_addresses(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<AddressListResponse>, ServiceError> {
    let addresses = state.services.addresses.list_addresses(user.user_id).await?;
    Ok(Json(AddressListResponse {
        success: true,
        addresses,
    }))
}
