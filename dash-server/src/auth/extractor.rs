//! Session extractor
//!
//! 会话 id 依次从 `session-id` header、`session-id` cookie、`?session-id=` 查询参数读取。
//! 查询参数只用于 WebSocket 升级请求（浏览器无法自定义 header）。

use axum::{extract::FromRequestParts, http::request::Parts};
use shared::{AppError, Role};

use crate::core::ServerState;
use crate::security_log;

/// Header / cookie / query key carrying the session id
pub const SESSION_HEADER: &str = "session-id";

/// 当前请求的已认证会话
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentSession {
    pub session_id: String,
    pub user_id: String,
    pub email: String,
    pub role: Role,
}

pub fn session_id_from_parts(parts: &Parts) -> Option<String> {
    if let Some(value) = parts
        .headers
        .get(SESSION_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return Some(value.to_string());
    }

    let from_cookie = parts
        .headers
        .get_all(http::header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .find_map(|pair| match pair.trim().split_once('=') {
            Some((k, v)) if k == SESSION_HEADER && !v.is_empty() => Some(v.to_string()),
            _ => None,
        });
    if from_cookie.is_some() {
        return from_cookie;
    }

    parts.uri.query().and_then(|q| {
        q.split('&').find_map(|pair| match pair.split_once('=') {
            Some((k, v)) if k == SESSION_HEADER && !v.is_empty() => Some(v.to_string()),
            _ => None,
        })
    })
}

impl FromRequestParts<ServerState> for CurrentSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<CurrentSession>() {
            return Ok(session.clone());
        }

        let Some(session_id) = session_id_from_parts(parts) else {
            security_log!("WARN", "session_missing", uri = format!("{:?}", parts.uri));
            return Err(AppError::not_authenticated());
        };

        match state.sessions.resolve(&session_id) {
            Ok(session) => {
                let current = CurrentSession {
                    session_id: session.session_id,
                    user_id: session.user_id,
                    email: session.email,
                    role: session.role,
                };
                parts.extensions.insert(current.clone());
                Ok(current)
            }
            Err(e) => {
                security_log!(
                    "WARN",
                    "session_rejected",
                    error = e.message.clone(),
                    uri = format!("{:?}", parts.uri)
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(builder: http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_header_wins() {
        let p = parts(
            Request::builder()
                .uri("/orders?session-id=q")
                .header("session-id", "h")
                .header("cookie", "session-id=c"),
        );
        assert_eq!(session_id_from_parts(&p).as_deref(), Some("h"));
    }

    #[test]
    fn test_cookie_then_query() {
        let p = parts(
            Request::builder()
                .uri("/orders")
                .header("cookie", "theme=dark; session-id=c"),
        );
        assert_eq!(session_id_from_parts(&p).as_deref(), Some("c"));

        let p = parts(Request::builder().uri("/ws/orders?x=1&session-id=q"));
        assert_eq!(session_id_from_parts(&p).as_deref(), Some("q"));

        let p = parts(Request::builder().uri("/ws/orders"));
        assert_eq!(session_id_from_parts(&p), None);
    }
}
