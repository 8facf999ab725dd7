//! Authentication Handlers

use axum::{
    Json,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use shared::models::{LoginRequest, LoginResponse};
use shared::{ApiResponse, AppError, AppResult};

use crate::api::ValidatedJson;
use crate::auth::{CurrentSession, SESSION_HEADER, verify_password};
use crate::core::ServerState;
use crate::security_log;

/// Verify credentials and issue a session
///
/// 返回体带 session id，同时写入 `session-id` cookie。未知用户与错误密码返回同一个错误。
pub async fn login(
    State(state): State<ServerState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> AppResult<Response> {
    let user = state.users.find_by_email(&req.email)?;

    let Some(user) = user.filter(|u| verify_password(&req.password, &u.password_hash)) else {
        security_log!("WARN", "login_failed", email = req.email.clone());
        return Err(AppError::invalid_credentials());
    };

    let session = state.sessions.create(&user)?;
    security_log!(
        "INFO",
        "login_success",
        user_id = user.id.clone(),
        role = user.role.as_str()
    );

    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_HEADER,
        session.session_id,
        state.config.session_ttl_secs
    );
    let body = LoginResponse {
        session_id: session.session_id,
        role: session.role,
    };
    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

pub async fn logout(
    State(state): State<ServerState>,
    session: CurrentSession,
) -> AppResult<Response> {
    state.sessions.revoke(&session.session_id)?;
    tracing::info!(user_id = %session.user_id, "Session revoked");

    let expired = format!("{}=; Path=/; HttpOnly; Max-Age=0", SESSION_HEADER);
    Ok(([(header::SET_COOKIE, expired)], ApiResponse::ok()).into_response())
}
