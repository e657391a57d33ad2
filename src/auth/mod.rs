/*!
 * # Authentication Module
 *
 * Session handling for the storefront:
 *
 * - Customer sessions: HS256 JWTs issued at login, carried in the `token`
 *   cookie or an `Authorization: Bearer` header.
 * - Seller (operator) sessions: the single configured operator account, carried
 *   in the `sellerToken` cookie and marked with the `seller` role.
 * - Password hashing with Argon2.
 */

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::AppConfig;

/// Cookie carrying a customer session
pub const USER_COOKIE: &str = "token";
/// Cookie carrying the operator session
pub const SELLER_COOKIE: &str = "sellerToken";
/// Role claim granted to the operator
pub const SELLER_ROLE: &str = "seller";

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,           // Subject (user ID, or the seller email)
    pub email: Option<String>, // Account email
    pub roles: Vec<String>,    // Granted roles
    pub jti: String,           // JWT ID
    pub iat: i64,              // Issued at time
    pub exp: i64,              // Expiration time
    pub nbf: i64,              // Not valid before time
    pub iss: String,           // Issuer
    pub aud: String,           // Audience
}

impl Claims {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Authenticated customer extracted from the session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub token_id: String,
}

/// Authenticated operator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellerUser {
    pub email: String,
}

/// Authentication configuration
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub token_expiration: Duration,
    pub seller_email: String,
    pub seller_password: String,
    /// Mark cookies `Secure` with `SameSite=None`
    pub secure_cookies: bool,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_audience", &self.jwt_audience)
            .field("jwt_issuer", &self.jwt_issuer)
            .field("token_expiration", &self.token_expiration)
            .field("seller_email", &self.seller_email)
            .field("secure_cookies", &self.secure_cookies)
            .finish_non_exhaustive()
    }
}

impl From<&AppConfig> for AuthConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            jwt_secret: cfg.jwt_secret.clone(),
            jwt_audience: cfg.auth_audience.clone(),
            jwt_issuer: cfg.auth_issuer.clone(),
            token_expiration: cfg.jwt_lifetime(),
            seller_email: cfg.seller_email.clone(),
            seller_password: cfg.seller_password.clone(),
            secure_cookies: cfg.is_production(),
        }
    }
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing token")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::MissingToken
            | Self::InvalidToken
            | Self::TokenExpired
            | Self::InsufficientPermissions => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            Self::InvalidCredentials => (StatusCode::UNAUTHORIZED, "Invalid email or password"),
            Self::TokenCreation(_) | Self::InternalError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        debug!(error = %self, "Authentication rejected");

        let body = Json(serde_json::json!({
            "success": false,
            "message": message,
        }));

        (status, body).into_response()
    }
}

/// Authentication service that handles token issuance, validation and password hashing
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    fn issue(&self, sub: String, email: Option<String>, roles: Vec<String>) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = now
            + ChronoDuration::from_std(self.config.token_expiration)
                .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;

        let claims = Claims {
            sub,
            email,
            roles,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Issues a customer session token
    pub fn issue_user_token(&self, user_id: Uuid, email: &str) -> Result<String, AuthError> {
        self.issue(user_id.to_string(), Some(email.to_string()), Vec::new())
    }

    /// Issues the operator session token
    pub fn issue_seller_token(&self) -> Result<String, AuthError> {
        self.issue(
            self.config.seller_email.clone(),
            Some(self.config.seller_email.clone()),
            vec![SELLER_ROLE.to_string()],
        )
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })
    }

    pub fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::InternalError(format!("password hashing failed: {}", e)))
    }

    pub fn verify_password(&self, password: &str, stored_hash: &str) -> bool {
        match PasswordHash::new(stored_hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                warn!("Stored password hash is unreadable: {}", e);
                false
            }
        }
    }

    /// Compares against the configured operator credentials without early exit.
    pub fn verify_seller_credentials(&self, email: &str, password: &str) -> bool {
        let email_ok = constant_time_eq(
            email.trim().to_lowercase().as_bytes(),
            self.config.seller_email.to_lowercase().as_bytes(),
        );
        let password_ok =
            constant_time_eq(password.as_bytes(), self.config.seller_password.as_bytes());
        email_ok & password_ok
    }

    /// `Set-Cookie` value establishing a session
    pub fn session_cookie(&self, name: &str, token: &str) -> Result<HeaderValue, AuthError> {
        let same_site = if self.config.secure_cookies {
            "SameSite=None; Secure"
        } else {
            "SameSite=Strict"
        };
        HeaderValue::from_str(&format!(
            "{}={}; Path=/; HttpOnly; Max-Age={}; {}",
            name,
            token,
            self.config.token_expiration.as_secs(),
            same_site
        ))
        .map_err(|e| AuthError::InternalError(format!("invalid cookie: {}", e)))
    }

    /// `Set-Cookie` value removing a session
    pub fn clear_cookie(&self, name: &str) -> Result<HeaderValue, AuthError> {
        let same_site = if self.config.secure_cookies {
            "SameSite=None; Secure"
        } else {
            "SameSite=Strict"
        };
        HeaderValue::from_str(&format!(
            "{}=; Path=/; HttpOnly; Max-Age=0; {}",
            name, same_site
        ))
        .map_err(|e| AuthError::InternalError(format!("invalid cookie: {}", e)))
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.iter().zip(b) {
        res |= x ^ y;
    }
    res == 0
}

/// Reads one cookie from the `Cookie` request headers
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

fn session_token(headers: &HeaderMap, cookie: &str) -> Option<String> {
    cookie_value(headers, cookie).or_else(|| bearer_token(headers))
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Arc<AuthService>: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_service = Arc::<AuthService>::from_ref(state);
        let token = session_token(&parts.headers, USER_COOKIE).ok_or(AuthError::MissingToken)?;
        let claims = auth_service.validate_token(&token)?;

        // Seller tokens are not customer sessions
        if claims.has_role(SELLER_ROLE) {
            return Err(AuthError::InsufficientPermissions);
        }
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        Ok(AuthUser {
            user_id,
            email: claims.email,
            token_id: claims.jti,
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for SellerUser
where
    S: Send + Sync,
    Arc<AuthService>: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_service = Arc::<AuthService>::from_ref(state);
        let token =
            session_token(&parts.headers, SELLER_COOKIE).ok_or(AuthError::MissingToken)?;
        let claims = auth_service.validate_token(&token)?;

        let email = claims.email.unwrap_or_default();
        if !claims.roles.iter().any(|r| r == SELLER_ROLE)
            || !email.eq_ignore_ascii_case(&auth_service.config.seller_email)
        {
            return Err(AuthError::InsufficientPermissions);
        }

        Ok(SellerUser { email })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn service() -> AuthService {
        AuthService::new(AuthConfig {
            jwt_secret: "a_test_jwt_secret_that_is_long_enough_0123456789".into(),
            jwt_audience: "storefront".into(),
            jwt_issuer: "storefront-api".into(),
            token_expiration: Duration::from_secs(3600),
            seller_email: "seller@example.com".into(),
            seller_password: "seller-password".into(),
            secure_cookies: false,
        })
    }

    #[test]
    fn user_token_round_trips() {
        let svc = service();
        let user_id = Uuid::new_v4();
        let token = svc.issue_user_token(user_id, "jane@example.com").unwrap();
        let claims = svc.validate_token(&token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert!(!claims.has_role(SELLER_ROLE));
    }

    #[test]
    fn token_from_other_issuer_is_rejected() {
        let svc = service();
        let mut other_config = svc.config.clone();
        other_config.jwt_issuer = "someone-else".into();
        let token = AuthService::new(other_config)
            .issue_user_token(Uuid::new_v4(), "x@example.com")
            .unwrap();
        assert_matches!(svc.validate_token(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn passwords_hash_and_verify() {
        let svc = service();
        let hash = svc.hash_password("hunter22").unwrap();
        assert!(svc.verify_password("hunter22", &hash));
        assert!(!svc.verify_password("hunter23", &hash));
        assert!(!svc.verify_password("hunter22", "not-a-hash"));
    }

    #[test]
    fn seller_credentials_are_checked() {
        let svc = service();
        assert!(svc.verify_seller_credentials("Seller@Example.com", "seller-password"));
        assert!(!svc.verify_seller_credentials("seller@example.com", "wrong"));
        assert!(!svc.verify_seller_credentials("other@example.com", "seller-password"));
    }

    #[test]
    fn cookie_parsing_finds_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; token=abc.def.ghi; sellerToken="),
        );
        assert_eq!(cookie_value(&headers, "token").as_deref(), Some("abc.def.ghi"));
        assert_eq!(cookie_value(&headers, "sellerToken"), None);
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn bearer_header_is_a_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(session_token(&headers, USER_COOKIE).as_deref(), Some("xyz"));
    }

    #[test]
    fn session_cookie_is_http_only() {
        let cookie = service().session_cookie(USER_COOKIE, "abc").unwrap();
        let cookie = cookie.to_str().unwrap();
        assert!(cookie.starts_with("token=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=3600"));
    }
}
