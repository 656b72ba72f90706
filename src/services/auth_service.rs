//! Registration, login and password flows.
//!
//! Functions return the affected [`User`]; issuing the session cookie is
//! left to the handlers.

use chrono::{Duration, Utc};
use tracing::{info, warn};

use super::record_activity;
use super::validation::{normalize_email, validate_email_format, validate_name, validate_new_password};
use crate::auth::{self, RESET_TOKEN_TTL_MINUTES};
use crate::database::models::{NewActivity, NewUser, User, UserChanges};
use crate::database::UserRepository;
use crate::error::ApiError;
use crate::mail::password_reset_message;
use crate::state::AppState;

const INCORRECT_CREDENTIALS: &str = "Incorrect email or password";
const INVALID_RESET_TOKEN: &str = "Token is invalid or has expired";

pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

/// Hash on a blocking thread; argon2 is deliberately slow.
pub(crate) async fn hash(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || auth::hash_password(&password))
        .await
        .map_err(ApiError::internal)?
        .map_err(ApiError::from)
}

async fn verify(password: String, hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || auth::verify_password(&password, &hash))
        .await
        .map_err(ApiError::internal)?
        .map_err(ApiError::from)
}

pub async fn register(state: &AppState, input: Registration) -> Result<User, ApiError> {
    validate_name(&input.name)?;
    let email = normalize_email(&input.email);
    validate_email_format(&email)?;
    validate_new_password(&input.password, &input.password_confirm)?;

    let password_hash = hash(input.password).await?;
    let user = state
        .store
        .create_user(NewUser::new(input.name.trim(), email, password_hash))
        .await?;

    info!(user_id = %user.id, "User registered");
    record_activity(state, NewActivity::new(user.id, None, "register", "user")).await;
    Ok(user)
}

/// Unknown email and wrong password fail with the same message.
pub async fn login(state: &AppState, email: &str, password: &str) -> Result<User, ApiError> {
    let email = normalize_email(email);
    let user = state.store.find_user_by_email(&email).await?;

    let Some(user) = user else {
        return Err(ApiError::unauthorized(INCORRECT_CREDENTIALS));
    };
    if !verify(password.to_string(), user.password_hash.clone()).await? {
        warn!(user_id = %user.id, "Failed login");
        return Err(ApiError::unauthorized(INCORRECT_CREDENTIALS));
    }

    let changes = UserChanges {
        last_login_at: Some(Utc::now()),
        ..Default::default()
    };
    let user = state.store.update_user(user.id, changes).await?.unwrap_or(user);

    record_activity(state, NewActivity::new(user.id, user.tenant_id, "login", "session")).await;
    Ok(user)
}

/// Stores a hashed reset token, mails the reset link and returns the raw token.
pub async fn forgot_password(state: &AppState, email: &str) -> Result<String, ApiError> {
    let email = normalize_email(email);
    let user = state
        .store
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::not_found("There is no user with that email address."))?;

    let token = auth::generate_reset_token();
    let expires = Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES);
    let changes = UserChanges {
        password_reset: Some(Some((auth::hash_reset_token(&token), expires))),
        ..Default::default()
    };
    state.store.update_user(user.id, changes).await?;

    let mail = &state.config.mail;
    let reset_url = format!("{}/reset-password/{}", mail.frontend_url, token);
    let message = password_reset_message(&user.email, &mail.from_email, &reset_url);

    if let Err(e) = state.mailer.send(message).await {
        tracing::error!(user_id = %user.id, "Sending reset email failed: {}", e);
        let clear = UserChanges {
            password_reset: Some(None),
            ..Default::default()
        };
        state.store.update_user(user.id, clear).await?;
        return Err(ApiError::internal_server_error(
            "There was an error sending the email. Try again later!",
        ));
    }

    info!(user_id = %user.id, "Password reset requested");
    Ok(token)
}

pub async fn reset_password(
    state: &AppState,
    token: &str,
    password: String,
    password_confirm: &str,
) -> Result<User, ApiError> {
    let now = Utc::now();
    let user = state
        .store
        .find_user_by_reset_token(&auth::hash_reset_token(token), now)
        .await?
        .ok_or_else(|| ApiError::bad_request(INVALID_RESET_TOKEN))?;

    validate_new_password(&password, password_confirm)?;
    let user = set_password(state, &user, password).await?;

    record_activity(state, NewActivity::new(user.id, user.tenant_id, "reset_password", "user")).await;
    Ok(user)
}

pub async fn update_password(
    state: &AppState,
    user: &User,
    current_password: &str,
    password: String,
    password_confirm: &str,
) -> Result<User, ApiError> {
    if !verify(current_password.to_string(), user.password_hash.clone()).await? {
        return Err(ApiError::unauthorized("Your current password is wrong"));
    }
    validate_new_password(&password, password_confirm)?;
    let user = set_password(state, user, password).await?;

    record_activity(state, NewActivity::new(user.id, user.tenant_id, "update_password", "user")).await;
    Ok(user)
}

/// Stamps `password_changed_at`; sessions issued before this instant stop working.
async fn set_password(state: &AppState, user: &User, password: String) -> Result<User, ApiError> {
    let password_hash = hash(password).await?;
    let changed_at = Utc::now();

    state
        .store
        .update_user(user.id, UserChanges::password(password_hash, changed_at))
        .await?
        .ok_or_else(|| ApiError::not_found("No user found with that ID"))
}
