//! The `session_id` cookie.

use axum_extra::extract::cookie::{Cookie, CookieJar};
use dq_domain::config::SessionsConfig;

pub const SESSION_COOKIE: &str = "session_id";

/// The caller's session token, if the cookie is present and non-empty.
pub fn session_token(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .map(|c| c.value().trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn mint_token() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// `session_id=<token>; HttpOnly; Secure; SameSite=Lax; Max-Age=<n>; Path=/`
pub fn session_cookie(token: &str, cfg: &SessionsConfig) -> Option<Cookie<'static>> {
    let secure = if cfg.cookie_secure { "Secure; " } else { "" };
    let raw = format!(
        "{SESSION_COOKIE}={token}; HttpOnly; {secure}SameSite=Lax; Max-Age={}; Path=/",
        cfg.cookie_max_age_secs
    );
    match Cookie::parse(raw) {
        Ok(cookie) => Some(cookie),
        Err(e) => {
            tracing::warn!(error = %e, "could not build session cookie");
            None
        }
    }
}
