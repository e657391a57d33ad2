use crate::{
    auth::{AuthError, AuthService},
    db::DbPool,
    entities::user::{self, Entity as UserEntity},
    errors::ServiceError,
    services::carts::{cart_from_json, Cart},
};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Public view of an account, including its cart
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[schema(value_type = Object)]
    pub cart_items: Cart,
}

impl From<user::Model> for UserProfile {
    fn from(model: user::Model) -> Self {
        Self {
            cart_items: cart_from_json(&model.cart_items),
            id: model.id,
            name: model.name,
            email: model.email,
        }
    }
}

/// Profile plus the freshly issued session token
#[derive(Debug, Clone)]
pub struct Session {
    pub user: UserProfile,
    pub token: String,
}

fn auth_failure(err: AuthError) -> ServiceError {
    match err {
        AuthError::InvalidCredentials => {
            ServiceError::Unauthorized("Invalid email or password".into())
        }
        other => ServiceError::InternalError(other.to_string()),
    }
}

#[derive(Clone)]
pub struct UserService {
    db_pool: Arc<DbPool>,
    auth: Arc<AuthService>,
}

impl UserService {
    pub fn new(db_pool: Arc<DbPool>, auth: Arc<AuthService>) -> Self {
        Self { db_pool, auth }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<user::Model>, ServiceError> {
        Ok(UserEntity::find()
            .filter(user::Column::Email.eq(email))
            .one(&*self.db_pool)
            .await?)
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: RegisterRequest) -> Result<Session, ServiceError> {
        request.validate()?;
        let email = request.email.trim().to_lowercase();

        if self.find_by_email(&email).await?.is_some() {
            return Err(ServiceError::Conflict("User already exists".into()));
        }

        let password_hash = self
            .auth
            .hash_password(&request.password)
            .map_err(auth_failure)?;

        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name.trim().to_string()),
            email: Set(email),
            password_hash: Set(password_hash),
            cart_items: Set(serde_json::json!({})),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await?;

        let token = self
            .auth
            .issue_user_token(model.id, &model.email)
            .map_err(auth_failure)?;

        info!(user_id = %model.id, "User registered");
        Ok(Session {
            user: model.into(),
            token,
        })
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn login(&self, request: LoginRequest) -> Result<Session, ServiceError> {
        request.validate()?;
        let email = request.email.trim().to_lowercase();

        let user = match self.find_by_email(&email).await? {
            Some(user) if self.auth.verify_password(&request.password, &user.password_hash) => user,
            _ => {
                warn!("Login rejected");
                return Err(auth_failure(AuthError::InvalidCredentials));
            }
        };

        let token = self
            .auth
            .issue_user_token(user.id, &user.email)
            .map_err(auth_failure)?;

        info!(user_id = %user.id, "User logged in");
        Ok(Session {
            user: user.into(),
            token,
        })
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_profile(&self, user_id: Uuid) -> Result<UserProfile, ServiceError> {
        UserEntity::find_by_id(user_id)
            .one(&*self.db_pool)
            .await?
            .map(Into::into)
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))
    }
}
