//! 健康检查路由
//!
//! | 路径 | 方法 | 说明 | 认证 |
//! |------|------|------|------|
//! | /health | GET | 代理连接状态、WebSocket 连接数 | 无 |
//!
//! ```json
//! { "status": "ok", "version": "0.1.0", "broker": "connected", "ws_connections": 2 }
//! ```

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().route("/health", get(health))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// ok | degraded
    status: &'static str,
    version: &'static str,
    /// 发布器连接状态
    broker: &'static str,
    ws_connections: usize,
}

async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    let broker = state.publisher.state();
    Json(HealthResponse {
        status: if broker.is_connected() { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        broker: broker.as_str(),
        ws_connections: state.hub.connection_count(),
    })
}
