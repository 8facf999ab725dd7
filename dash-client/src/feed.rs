//! OrderFeed - `/ws/orders` 实时订阅
//!
//! 1. 连接 WebSocket (session id 走查询参数)
//! 2. 连接成功后 `GET /orders` 回补断线期间错过的变更
//! 3. 每个 text frame 解析为一个 Order 快照
//! 4. 断线后指数退避重连；会话被拒绝时停止

use futures::StreamExt;
use shared::Order;
use shared::models::OrderQuery;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;

use crate::{ApiClient, ClientConfig, ClientError, ClientResult};

/// Initial reconnect delay
const INITIAL_RECONNECT_DELAY: Duration = Duration::from_millis(500);
/// Max reconnect delay
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);
const FEED_BUFFER: usize = 256;

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Connecting,
    Connected,
    /// Newest-first listing fetched right after (re)connecting
    Backfill(Vec<Order>),
    Order(Order),
    Disconnected(String),
    /// Server refused the session; the feed has stopped
    Rejected,
}

enum SessionEnd {
    Shutdown,
    ReceiverGone,
    Rejected,
    Lost(String),
}

pub struct OrderFeed {
    api: ApiClient,
    ws_url: String,
    shutdown: CancellationToken,
    initial_delay: Duration,
}

impl OrderFeed {
    /// `api` must already hold a session
    pub fn new(config: &ClientConfig, api: ApiClient, shutdown: CancellationToken) -> ClientResult<Self> {
        let session = api.session_id().ok_or(ClientError::Unauthorized)?;
        let ws_url = config.ws_url(session);
        Ok(Self {
            api,
            ws_url,
            shutdown,
            initial_delay: INITIAL_RECONNECT_DELAY,
        })
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Run on a background task, returning the event stream
    pub fn spawn(self) -> mpsc::Receiver<FeedEvent> {
        let (tx, rx) = mpsc::channel(FEED_BUFFER);
        tokio::spawn(self.run(tx));
        rx
    }

    /// Main run loop: connect, backfill, stream, reconnect on failure
    pub async fn run(self, tx: mpsc::Sender<FeedEvent>) {
        tracing::info!("Order feed started");
        let mut reconnect_delay = self.initial_delay;

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }
            if tx.send(FeedEvent::Connecting).await.is_err() {
                break;
            }

            let reason = match self.session(&tx, &mut reconnect_delay).await {
                SessionEnd::Shutdown | SessionEnd::ReceiverGone => break,
                SessionEnd::Rejected => {
                    tracing::error!("Order feed session rejected, stopping");
                    let _ = tx.send(FeedEvent::Rejected).await;
                    break;
                }
                SessionEnd::Lost(reason) => reason,
            };

            tracing::warn!(
                delay_ms = reconnect_delay.as_millis() as u64,
                reason = %reason,
                "Order feed disconnected, reconnecting"
            );
            if tx.send(FeedEvent::Disconnected(reason)).await.is_err() {
                break;
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(reconnect_delay) => {},
            }
            reconnect_delay = (reconnect_delay * 2).min(MAX_RECONNECT_DELAY);
        }

        tracing::info!("Order feed stopped");
    }

    /// Run a single WebSocket session until disconnect or shutdown
    async fn session(&self, tx: &mpsc::Sender<FeedEvent>, reconnect_delay: &mut Duration) -> SessionEnd {
        let connect = tokio::select! {
            _ = self.shutdown.cancelled() => return SessionEnd::Shutdown,
            result = self.connect() => result,
        };
        let mut ws = match connect {
            Ok(ws) => ws,
            Err(ClientError::Unauthorized) => return SessionEnd::Rejected,
            Err(e) => return SessionEnd::Lost(e.to_string()),
        };

        *reconnect_delay = self.initial_delay;
        if tx.send(FeedEvent::Connected).await.is_err() {
            return SessionEnd::ReceiverGone;
        }

        // 先订阅再回补，重叠部分由 OrderBoard 的版本号去重
        match self.api.list_orders(&OrderQuery::default()).await {
            Ok(orders) => {
                tracing::debug!(count = orders.len(), "Backfill fetched");
                if tx.send(FeedEvent::Backfill(orders)).await.is_err() {
                    return SessionEnd::ReceiverGone;
                }
            }
            Err(ClientError::Unauthorized) => return SessionEnd::Rejected,
            Err(e) => tracing::warn!(error = %e, "Backfill failed, continuing with live updates"),
        }

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    let _ = ws.close(None).await;
                    return SessionEnd::Shutdown;
                }
                msg = ws.next() => match msg {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<Order>(text.as_str()) {
                        Ok(order) => {
                            if tx.send(FeedEvent::Order(order)).await.is_err() {
                                return SessionEnd::ReceiverGone;
                            }
                        }
                        Err(e) => tracing::warn!(error = %e, "Ignoring malformed order frame"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| f.reason.as_str().to_string())
                            .filter(|r| !r.is_empty())
                            .unwrap_or_else(|| "closed by server".into());
                        return SessionEnd::Lost(reason);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return SessionEnd::Lost(ClientError::WebSocket(e.to_string()).to_string()),
                    None => return SessionEnd::Lost("stream ended".into()),
                },
            }
        }
    }

    /// WebSocket 握手；401 视为会话失效
    async fn connect(&self) -> ClientResult<WsStream> {
        match tokio_tungstenite::connect_async(self.ws_url.as_str()).await {
            Ok((ws, _)) => Ok(ws),
            Err(tungstenite::Error::Http(response))
                if response.status() == tungstenite::http::StatusCode::UNAUTHORIZED =>
            {
                Err(ClientError::Unauthorized)
            }
            Err(e) => Err(ClientError::WebSocket(e.to_string())),
        }
    }
}
