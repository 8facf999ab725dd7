//! Order API Module
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /orders | POST | 结账下单 (201) |
//! | /orders | GET | 订单列表 (status, type, from, to)，最新在前 |
//! | /orders/{id} | GET | 订单详情 |
//! | /orders/{id}/status | PUT | 推进状态 |
//!
//! 所有路由都需要会话。写操作的响应带有 `x-order-propagation: published | degraded`。

mod handler;

use axum::{
    Router,
    routing::{get, put},
};

use crate::core::ServerState;

pub use handler::PROPAGATION_HEADER;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/orders", get(handler::list).post(handler::create))
        .route("/orders/{id}", get(handler::get_by_id))
        .route("/orders/{id}/status", put(handler::update_status))
}
