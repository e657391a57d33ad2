use super::common::{JsonBody, MessageResponse};
use crate::{
    auth::{AuthUser, USER_COOKIE},
    errors::ServiceError,
    services::users::{LoginRequest, RegisterRequest, Session, UserProfile},
    AppState,
};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub success: bool,
    pub user: UserProfile,
    /// Same token as the `token` cookie, for non-browser clients
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    pub success: bool,
    pub user: UserProfile,
}

fn session_response(
    state: &AppState,
    status: StatusCode,
    session: Session,
) -> Result<Response, ServiceError> {
    let cookie = state
        .auth
        .session_cookie(USER_COOKIE, &session.token)
        .map_err(|e| ServiceError::InternalError(e.to_string()))?;

    Ok((
        status,
        [(header::SET_COOKIE, cookie)],
        Json(SessionResponse {
            success: true,
            user: session.user,
            token: session.token,
        }),
    )
        .into_response())
}

/// Create a customer account and start a session
#[utoipa::path(
    post,
    path = "/api/user/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = SessionResponse),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::errors::ErrorResponse)
    ),
    tag = "Users"
)]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RegisterRequest>,
) -> Result<Response, ServiceError> {
    let session = state.services.users.register(request).await?;
    session_response(&state, StatusCode::CREATED, session)
}

/// Start a customer session
#[utoipa::path(
    post,
    path = "/api/user/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = SessionResponse),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse)
    ),
    tag = "Users"
)]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<Response, ServiceError> {
    let session = state.services.users.login(request).await?;
    session_response(&state, StatusCode::OK, session)
}

/// The signed-in customer
#[utoipa::path(
    get,
    path = "/api/user/auth",
    responses(
        (status = 200, description = "Current user", body = ProfileResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "Users"
)]
pub async fn current_user(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ProfileResponse>, ServiceError> {
    let user = state.services.users.get_profile(user.user_id).await?;
    Ok(Json(ProfileResponse {
        success: true,
        user,
    }))
}

/// End the customer session
#[utoipa::path(
    get,
    path = "/api/user/logout",
    responses((status = 200, description = "Logged out", body = MessageResponse)),
    tag = "Users"
)]
pub async fn logout(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let cookie = state
        .auth
        .clear_cookie(USER_COOKIE)
        .map_err(|e| ServiceError::InternalError(e.to_string()))?;
    Ok(([(header::SET_COOKIE, cookie)], MessageResponse::ok("Logged Out")).into_response())
}
