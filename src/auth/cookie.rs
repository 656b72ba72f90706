use axum_extra::extract::cookie::{Cookie, SameSite};

use crate::config::SecurityConfig;

pub const JWT_COOKIE: &str = "jwt";

/// Value written over the session cookie on logout.
pub const LOGGED_OUT: &str = "loggedout";

pub fn session_cookie(token: String, security: &SecurityConfig) -> Cookie<'static> {
    Cookie::build((JWT_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(security.secure_cookies)
        .max_age(time::Duration::days(security.cookie_expires_in_days))
        .build()
}

/// Replaces the session with a sentinel that expires in 10 seconds.
pub fn logged_out_cookie(security: &SecurityConfig) -> Cookie<'static> {
    Cookie::build((JWT_COOKIE, LOGGED_OUT))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(security.secure_cookies)
        .max_age(time::Duration::seconds(10))
        .build()
}
