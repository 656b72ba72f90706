use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use crate::auth::{self, JWT_COOKIE, LOGGED_OUT};
use crate::database::models::User;
use crate::database::UserRepository;
use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated account, attached to request extensions by [`require_auth`].
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(ApiError::not_logged_in)
    }
}

/// Session gate: resolves the token to an active user or answers 401.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(&jar, request.headers()).ok_or_else(ApiError::not_logged_in)?;
    let claims = auth::verify_token(&token, &state.config.security)?;

    let user = state
        .store
        .find_user(claims.id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("The user belonging to this token no longer exists."))?;

    if user.changed_password_after(claims.iat_ms) {
        return Err(ApiError::unauthorized("User recently changed password! Please log in again."));
    }

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

/// Session cookie first, then `Authorization: Bearer`. The logout sentinel
/// counts as no token.
fn extract_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    let from_cookie = jar.get(JWT_COOKIE).map(|c| c.value().to_string());
    let from_header = || {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string())
    };

    from_cookie
        .filter(|t| !t.is_empty() && t != LOGGED_OUT)
        .or_else(from_header)
        .filter(|t| !t.is_empty() && t != LOGGED_OUT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use axum_extra::extract::cookie::Cookie;

    #[test]
    fn cookie_wins_over_header() {
        let jar = CookieJar::new().add(Cookie::new(JWT_COOKIE, "from-cookie"));
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(extract_token(&jar, &headers).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn falls_back_to_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(extract_token(&CookieJar::new(), &headers).as_deref(), Some("abc"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_token(&CookieJar::new(), &headers), None);
    }

    #[test]
    fn logged_out_sentinel_is_not_a_token() {
        let jar = CookieJar::new().add(Cookie::new(JWT_COOKIE, LOGGED_OUT));
        assert_eq!(extract_token(&jar, &HeaderMap::new()), None);
    }
}
