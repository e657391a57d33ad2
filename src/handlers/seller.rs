use super::common::{JsonBody, MessageResponse};
use crate::{
    auth::{SellerUser, SELLER_COOKIE},
    errors::ServiceError,
    AppState,
};
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SellerLoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SellerSessionResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
}

/// Operator login against the configured seller account
#[utoipa::path(
    post,
    path = "/api/seller/login",
    request_body = SellerLoginRequest,
    responses(
        (status = 200, description = "Logged in", body = SellerSessionResponse),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse)
    ),
    tag = "Seller"
)]
pub async fn seller_login(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<SellerLoginRequest>,
) -> Result<Response, ServiceError> {
    if !state
        .auth
        .verify_seller_credentials(&request.email, &request.password)
    {
        warn!("Seller login rejected");
        return Err(ServiceError::Unauthorized("Invalid Credentials".into()));
    }

    let token = state
        .auth
        .issue_seller_token()
        .map_err(|e| ServiceError::InternalError(e.to_string()))?;
    let cookie = state
        .auth
        .session_cookie(SELLER_COOKIE, &token)
        .map_err(|e| ServiceError::InternalError(e.to_string()))?;

    info!("Seller logged in");
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(SellerSessionResponse {
            success: true,
            message: "Logged In".into(),
            token,
        }),
    )
        .into_response())
}

/// Whether the operator session is valid
#[utoipa::path(
    get,
    path = "/api/seller/auth",
    responses(
        (status = 200, description = "Authenticated", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "Seller"
)]
pub async fn seller_auth(seller: SellerUser) -> Json<MessageResponse> {
    MessageResponse::ok(format!("Authenticated as {}", seller.email))
}

/// End the operator session
#[utoipa::path(
    get,
    path = "/api/seller/logout",
    responses((status = 200, description = "Logged out", body = MessageResponse)),
    tag = "Seller"
)]
pub async fn seller_logout(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let cookie = state
        .auth
        .clear_cookie(SELLER_COOKIE)
        .map_err(|e| ServiceError::InternalError(e.to_string()))?;
    Ok(([(header::SET_COOKIE, cookie)], MessageResponse::ok("Logged Out")).into_response())
}
