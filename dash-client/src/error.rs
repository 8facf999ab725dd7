//! Client error types

use shared::{ApiResponse, AppError, ErrorCode};
use thiserror::Error;

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// WebSocket handshake or stream failure
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Invalid response format
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Missing or rejected session
    #[error("Authentication required")]
    Unauthorized,

    /// Error body returned by the server
    #[error("Server error {}: {}", .0.code, .0.message)]
    Api(AppError),

    /// Missing client configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// Decode a non-2xx response body
    ///
    /// 服务端错误体形如 `{"errorCode": 4002, "message": "..."}`；解析失败时保留原文。
    pub fn from_response(status: reqwest::StatusCode, body: &str) -> Self {
        let api_error = serde_json::from_str::<ApiResponse<()>>(body)
            .ok()
            .and_then(ApiResponse::into_error);

        match api_error {
            Some(err)
                if matches!(
                    err.code,
                    ErrorCode::NotAuthenticated | ErrorCode::SessionExpired
                ) =>
            {
                ClientError::Unauthorized
            }
            Some(err) => ClientError::Api(err),
            None if status == reqwest::StatusCode::UNAUTHORIZED => ClientError::Unauthorized,
            None => ClientError::InvalidResponse(format!("{}: {}", status, body)),
        }
    }

    /// Server error code, if the server sent one
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::Api(err) => Some(err.code),
            ClientError::Unauthorized => Some(ErrorCode::NotAuthenticated),
            _ => None,
        }
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
