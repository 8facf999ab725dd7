//! WebSocket endpoint: 实时订单推送
//!
//! GET /ws/orders?session-id=<id>
//! 认证: session id 可通过 query parameter 传递（浏览器 WebSocket 不支持自定义 headers）
//!
//! 协议: Server → Client 每个 text frame 一个完整 Order JSON 快照。
//! 客户端消息被忽略。订阅者落后太多时服务端发送 Close，客户端重连后通过 GET /orders 补齐。

use axum::extract::State;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use shared::Order;
use tokio::sync::broadcast;
use tokio::time::Duration;

use crate::auth::CurrentSession;
use crate::core::ServerState;

const PING_INTERVAL: Duration = Duration::from_secs(30);

/// GET /ws/orders
pub async fn handle_orders_ws(
    State(state): State<ServerState>,
    session: CurrentSession,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    // 101 发出之前就订阅：客户端收到握手响应后立即回补，之后的推送不会落空
    let hub_rx = state.hub.subscribe();
    ws.on_upgrade(move |socket| orders_ws_session(socket, state, session, hub_rx))
}

async fn orders_ws_session(
    socket: WebSocket,
    state: ServerState,
    session: CurrentSession,
    mut hub_rx: broadcast::Receiver<Order>,
) {
    let (mut sink, mut stream) = socket.split();
    let _guard = state.hub.track_connection();

    tracing::info!(
        user_id = %session.user_id,
        role = %session.role,
        connections = state.hub.connection_count(),
        "Orders WS connected"
    );

    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    ping_interval.tick().await; // skip immediate

    loop {
        tokio::select! {
            _ = state.shutdown_token.cancelled() => {
                let _ = sink.send(close_message(close_code::AWAY, "server shutting down")).await;
                break;
            }

            _ = ping_interval.tick() => {
                if sink.send(Message::Ping(vec![].into())).await.is_err() {
                    break;
                }
            }

            event = hub_rx.recv() => {
                match event {
                    Ok(order) => {
                        let json = match serde_json::to_string(&order) {
                            Ok(json) => json,
                            Err(e) => {
                                tracing::error!(order_id = %order.id, error = %e, "Failed to serialize order");
                                continue;
                            }
                        };
                        if sink.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // 已丢失更新，关闭连接让客户端重连并回补
                        tracing::warn!(user_id = %session.user_id, lagged = n, "Orders WS subscriber lagged, closing");
                        let _ = sink.send(close_message(close_code::AGAIN, "lagged, reconnect and backfill")).await;
                        break;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    tracing::info!(user_id = %session.user_id, "Orders WS disconnected");
}

fn close_message(code: u16, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: reason.into(),
    }))
}
