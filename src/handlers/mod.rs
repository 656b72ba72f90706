//! Route handlers grouped by security tier:
//! `public` (no session), `protected` (any signed-in user) and
//! `elevated` (admin or super-admin).

pub mod elevated;
pub mod protected;
pub mod public;

use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth;
use crate::database::models::User;
use crate::database::repository::{page_limit, DEFAULT_PAGE_SIZE};
use crate::error::ApiError;
use crate::state::AppState;

/// Parses a path id, answering 400 `Invalid id: ...` for malformed input.
pub fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::invalid_id(raw))
}

/// Adds a fresh session cookie for `user` to the jar.
pub fn start_session(state: &AppState, jar: CookieJar, user: &User) -> Result<CookieJar, ApiError> {
    let token = auth::issue_token(user.id, &state.config.security)?;
    Ok(jar.add(auth::session_cookie(token, &state.config.security)))
}

pub fn end_session(state: &AppState, jar: CookieJar) -> CookieJar {
    jar.add(auth::logged_out_cookie(&state.config.security))
}

/// `?page=&limit=` with 1-based pages.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl Pagination {
    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u64 {
        page_limit(self.limit.unwrap_or(DEFAULT_PAGE_SIZE))
    }

    pub fn offset(&self) -> u64 {
        (self.page() - 1).saturating_mul(self.limit())
    }
}

/// Parses an optional enum-valued query parameter.
pub fn parse_param<T: std::str::FromStr>(name: &str, raw: Option<&str>) -> Result<Option<T>, ApiError> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ApiError::bad_request(format!("Invalid {}: {}", name, value))),
        None => Ok(None),
    }
}
