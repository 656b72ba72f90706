//! Session tokens, password hashing, reset tokens and the session cookie.

pub mod cookie;
pub mod password;
pub mod reset;

pub use cookie::{logged_out_cookie, session_cookie, JWT_COOKIE, LOGGED_OUT};
pub use password::{hash_password, verify_password};
pub use reset::{generate_reset_token, hash_reset_token, RESET_TOKEN_TTL_MINUTES};

use chrono::{Duration, Utc};
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::SecurityConfig;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("JWT secret is not configured")]
    MissingSecret,

    #[error("crypto error: {0}")]
    Crypto(String),
}

/// Claims carried by a session token.
///
/// `iat_ms` is the issue time in milliseconds; it is compared against a
/// user's `password_changed_at` so a token minted in the same second as a
/// password change is still judged correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: Uuid,
    pub iat: i64,
    pub iat_ms: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, expires_in_days: i64) -> Self {
        let now = Utc::now();
        Self {
            id: user_id,
            iat: now.timestamp(),
            iat_ms: now.timestamp_millis(),
            exp: (now + Duration::days(expires_in_days)).timestamp(),
        }
    }
}

/// Sign a session token for `user_id` with HS256.
pub fn issue_token(user_id: Uuid, security: &SecurityConfig) -> Result<String, AuthError> {
    if security.jwt_secret.is_empty() {
        return Err(AuthError::MissingSecret);
    }

    let claims = Claims::new(user_id, security.jwt_expires_in_days);
    let key = EncodingKey::from_secret(security.jwt_secret.as_bytes());

    jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &key)
        .map_err(|e| AuthError::Crypto(format!("JWT encode: {e}")))
}

/// Verify signature and expiry and return the claims.
pub fn verify_token(token: &str, security: &SecurityConfig) -> Result<Claims, AuthError> {
    if security.jwt_secret.is_empty() {
        return Err(AuthError::MissingSecret);
    }

    let key = DecodingKey::from_secret(security.jwt_secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp"]);

    jsonwebtoken::decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::TokenInvalid(e.to_string()),
        })
}
