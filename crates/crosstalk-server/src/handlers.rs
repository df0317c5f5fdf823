//! HTTP request handlers organized by route group.

use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::StatusCode;
use axum::response::{AppendHeaders, IntoResponse};
use axum::{http::HeaderMap, Json};
use serde::Deserialize;
use serde_json::json;

use crosstalk_accounts::AccountError;

use crate::auth::{self, AuthSession};
use crate::server::AppState;

/// Longest message the send endpoints accept, in characters.
const MAX_MESSAGE_CHARS: usize = 500;
const MIN_USERNAME_CHARS: usize = 3;
const MAX_USERNAME_CHARS: usize = 50;
const MIN_PASSWORD_CHARS: usize = 4;
const MAX_PASSWORD_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
}

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": message.into() })),
    )
}

// ── System ──

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "bus": state.relay.connection_state().as_str(),
    }))
}

// ── Relay ──

/// `GET /iot/latest`: connection state plus the most recent device payload.
pub async fn iot_latest(_session: AuthSession, State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "connected": state.relay.connection_state().is_connected(),
        "topic": state.topic,
        "last": state.relay.last_seen(),
    }))
}

/// `GET /chat/messages`
pub async fn chat_messages(
    _session: AuthSession,
    State(state): State<AppState>,
) -> impl IntoResponse {
    Json(json!({
        "messages": state.relay.snapshot(),
        "connected": state.relay.connection_state().is_connected(),
    }))
}

/// `POST /iot/send` and `POST /chat/send`; one handler serves both paths.
pub async fn send_message(
    session: AuthSession,
    State(state): State<AppState>,
    Json(request): Json<SendMessageRequest>,
) -> impl IntoResponse {
    if request.message.chars().count() > MAX_MESSAGE_CHARS {
        return bad_request("message too long").into_response();
    }

    match state.publisher.send(&session.username, &request.message).await {
        Ok(sent) => Json(json!({ "success": true, "sent": sent })).into_response(),
        Err(err) if err.is_client_error() => bad_request(err.to_string()).into_response(),
        Err(err) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}

// ── Accounts ──

/// `POST /auth/register`: creates the account and logs it in immediately.
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> impl IntoResponse {
    let username_len = request.username.chars().count();
    if !(MIN_USERNAME_CHARS..=MAX_USERNAME_CHARS).contains(&username_len) {
        return bad_request("username must be 3-50 characters").into_response();
    }
    let password_len = request.password.chars().count();
    if !(MIN_PASSWORD_CHARS..=MAX_PASSWORD_CHARS).contains(&password_len) {
        return bad_request("password must be 4-200 characters").into_response();
    }

    let user = match state
        .accounts
        .create(&request.username, &request.password, request.email)
    {
        Ok(user) => user,
        Err(err @ AccountError::DuplicateUsername(_)) => {
            return (
                StatusCode::CONFLICT,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response();
        }
        Err(err) => {
            tracing::error!(error = %err, "account creation failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal error" })),
            )
                .into_response();
        }
    };

    let token = state.sessions.create(&user.username);
    state.relay.metrics().gauge_inc("sessions.active", &[], 1.0);
    (
        AppendHeaders([(
            SET_COOKIE,
            auth::session_cookie(&token, state.session_ttl_secs),
        )]),
        Json(json!({ "success": true, "user": user.public() })),
    )
        .into_response()
}

/// `POST /auth/login`
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> impl IntoResponse {
    let Ok(user) = state
        .accounts
        .verify_credentials(&request.username, &request.password)
    else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid credentials" })),
        )
            .into_response();
    };

    let token = state.sessions.create(&user.username);
    state.relay.metrics().gauge_inc("sessions.active", &[], 1.0);
    (
        AppendHeaders([(
            SET_COOKIE,
            auth::session_cookie(&token, state.session_ttl_secs),
        )]),
        Json(json!({ "success": true, "user": user.public() })),
    )
        .into_response()
}

/// `POST /auth/logout`: succeeds whether or not a session was present.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(session) = auth::session_from_headers(&headers, &state) {
        if state.sessions.revoke(&session.token) {
            state.relay.metrics().gauge_inc("sessions.active", &[], -1.0);
        }
    }
    (
        AppendHeaders([(SET_COOKIE, auth::clear_session_cookie())]),
        Json(json!({ "success": true })),
    )
}

/// `GET /auth/me`: the logged-in user, or `null` without a valid session.
pub async fn me(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let user = auth::session_from_headers(&headers, &state)
        .and_then(|session| state.accounts.find_by_name(&session.username))
        .map(|record| record.public());
    Json(json!({ "user": user }))
}
