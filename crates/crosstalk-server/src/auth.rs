//! Session-cookie authentication for the HTTP surface.
//!
//! Sessions live server-side in the session registry; the browser only
//! holds an opaque token in the `crosstalk_session` cookie.

use axum::extract::FromRequestParts;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::server::AppState;

/// Name of the browser session cookie.
pub const SESSION_COOKIE: &str = "crosstalk_session";

/// Extract a named cookie's value from a `Cookie` request header.
fn token_from_cookie_header<'a>(cookie_header: &'a str, cookie_name: &str) -> Option<&'a str> {
    cookie_header.split(';').map(str::trim).find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        if name.trim() == cookie_name {
            Some(value.trim())
        } else {
            None
        }
    })
}

/// `Set-Cookie` value installing a session token.
pub(crate) fn session_cookie(token: &str, max_age_secs: u64) -> String {
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}")
}

/// `Set-Cookie` value clearing the session cookie.
pub(crate) fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// An authenticated, unexpired session.
///
/// As an extractor this rejects the request with `401` when the cookie is
/// missing, unknown, or expired. Handlers that treat the session as
/// optional go through [`session_from_headers`] instead.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub username: String,
}

/// Resolve the session named by the request's cookie, if any.
pub(crate) fn session_from_headers(headers: &HeaderMap, state: &AppState) -> Option<AuthSession> {
    let token = headers
        .get(COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| token_from_cookie_header(raw, SESSION_COOKIE))?;
    let session = state.sessions.resolve(token)?;
    Some(AuthSession {
        token: token.to_string(),
        username: session.username,
    })
}

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        session_from_headers(&parts.headers, state).ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "authentication required" })),
            )
                .into_response()
        })
    }
}
