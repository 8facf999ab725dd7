//! 事件发布器
//!
//! 持有唯一一个代理连接 + 通道，所有请求共享。
//!
//! # 状态机
//!
//! ```text
//! Disconnected ──connect()──▶ Connecting ──ok──▶ Connected
//!      ▲                          │                  │
//!      └────────── 重试用尽 ───────┘     publish 失败 ─┘
//! ```
//!
//! - 连接建立后先把所有已知队列声明为 durable，再允许发布
//! - `publish` 在未连接时懒连接（与启动连接使用同一个 [`RetryPolicy`]）
//! - 发布失败时丢弃通道，重连后重试一次；仍失败返回 `ChannelUnavailable`
//! - 通道由 `tokio::sync::Mutex` 保护：同一时刻只有一个 connect 在进行，
//!   并发发布在重连期间排队，而不是各自发起连接
//! - 排队期间那一轮重连失败时，排队者直接返回 `ChannelUnavailable`，
//!   不再各自跑一轮完整重试

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use shared::Order;
use shared::message::{ALL_QUEUES, OrderEvent};
use tokio::sync::{Mutex, watch};

use super::broker::{BrokerChannel, BrokerConnector, BrokerError, BrokerResult};
use super::retry::RetryPolicy;

/// 发布器连接状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected { reason: Option<String> },
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected { .. } => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        }
    }
}

/// 订单事件出口 (OrderService 依赖此 trait，测试中可替换为 spy)
#[async_trait]
pub trait OrderEventSink: Send + Sync {
    async fn publish_order(&self, event: OrderEvent, order: &Order) -> BrokerResult<()>;
}

struct Inner {
    connector: Arc<dyn BrokerConnector>,
    policy: RetryPolicy,
    channel: Mutex<Option<Box<dyn BrokerChannel>>>,
    state_tx: watch::Sender<ConnectionState>,
    /// 失败 (或被取消) 的连接轮次计数
    failed_connects: AtomicU64,
}

/// 一轮连接尝试；未成功结束 (包括 future 被丢弃) 时记为失败
struct ConnectAttempt<'a> {
    inner: &'a Inner,
    finished: bool,
}

impl<'a> ConnectAttempt<'a> {
    fn begin(inner: &'a Inner) -> Self {
        inner.state_tx.send_replace(ConnectionState::Connecting);
        Self {
            inner,
            finished: false,
        }
    }

    fn succeeded(mut self) {
        self.finished = true;
        self.inner.state_tx.send_replace(ConnectionState::Connected);
    }

    fn failed(mut self, reason: String) {
        self.finished = true;
        self.inner.failed_connects.fetch_add(1, Ordering::SeqCst);
        self.inner.state_tx.send_replace(ConnectionState::Disconnected {
            reason: Some(reason),
        });
    }
}

impl Drop for ConnectAttempt<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.inner.failed_connects.fetch_add(1, Ordering::SeqCst);
            self.inner.state_tx.send_replace(ConnectionState::Disconnected {
                reason: Some("connect abandoned".into()),
            });
        }
    }
}

/// Durable event publisher (Arc 浅拷贝)
#[derive(Clone)]
pub struct EventPublisher {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for EventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPublisher")
            .field("connector", &self.inner.connector)
            .field("policy", &self.inner.policy)
            .field("state", &*self.inner.state_tx.borrow())
            .finish()
    }
}

impl EventPublisher {
    pub fn new(connector: Arc<dyn BrokerConnector>, policy: RetryPolicy) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected { reason: None });
        Self {
            inner: Arc::new(Inner {
                connector,
                policy,
                channel: Mutex::new(None),
                state_tx,
                failed_connects: AtomicU64::new(0),
            }),
        }
    }

    /// 订阅连接状态变化
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state_tx.borrow().clone()
    }

    pub fn policy(&self) -> RetryPolicy {
        self.inner.policy
    }

    fn set_state(&self, state: ConnectionState) {
        self.inner.state_tx.send_replace(state);
    }

    /// 建立连接 (已连接时直接返回)
    ///
    /// 用尽重试次数返回 [`BrokerError::Unavailable`]；启动路径把它视为致命错误。
    pub async fn connect(&self) -> BrokerResult<()> {
        let mut guard = self.inner.channel.lock().await;
        if guard.as_ref().is_some_and(|ch| ch.is_open()) {
            return Ok(());
        }
        self.connect_locked(&mut guard).await
    }

    /// 调用方必须持有通道锁
    async fn connect_locked(&self, slot: &mut Option<Box<dyn BrokerChannel>>) -> BrokerResult<()> {
        if let Some(stale) = slot.take() {
            let _ = stale.close().await;
        }
        let attempt = ConnectAttempt::begin(&self.inner);

        let connector = self.inner.connector.clone();
        let result = self
            .inner
            .policy
            .run("Broker connect", |_| {
                let connector = connector.clone();
                async move {
                    let channel = connector.connect().await?;
                    for queue in ALL_QUEUES {
                        channel.declare_durable(queue).await?;
                    }
                    Ok::<_, BrokerError>(channel)
                }
            })
            .await;

        match result {
            Ok(channel) => {
                *slot = Some(channel);
                attempt.succeeded();
                tracing::info!(queues = ?ALL_QUEUES, "Broker connected, queues declared durable");
                Ok(())
            }
            Err((e, attempts)) => {
                let reason = e.to_string();
                attempt.failed(reason.clone());
                Err(BrokerError::Unavailable { attempts, reason })
            }
        }
    }

    /// 序列化并发布到指定队列
    pub async fn publish<T: Serialize + ?Sized>(&self, queue: &str, message: &T) -> BrokerResult<()> {
        let payload = serde_json::to_vec(message)?;
        self.publish_bytes(queue, &payload).await
    }

    async fn publish_bytes(&self, queue: &str, payload: &[u8]) -> BrokerResult<()> {
        let failures_seen = self.inner.failed_connects.load(Ordering::SeqCst);
        let mut guard = self.inner.channel.lock().await;

        if !guard.as_ref().is_some_and(|ch| ch.is_open()) {
            if self.inner.failed_connects.load(Ordering::SeqCst) != failures_seen {
                return Err(BrokerError::ChannelUnavailable(
                    "broker reconnect failed while publish was queued".into(),
                ));
            }
            self.connect_locked(&mut guard)
                .await
                .map_err(|e| BrokerError::ChannelUnavailable(e.to_string()))?;
        }

        let first = match guard.as_ref() {
            Some(channel) => channel.publish_persistent(queue, payload).await,
            None => Err(BrokerError::Channel("no channel".into())),
        };
        let Err(first_err) = first else {
            tracing::debug!(queue, bytes = payload.len(), "Published");
            return Ok(());
        };

        tracing::warn!(queue, error = %first_err, "Publish failed, reconnecting and retrying once");
        self.set_state(ConnectionState::Disconnected {
            reason: Some(first_err.to_string()),
        });
        self.connect_locked(&mut guard)
            .await
            .map_err(|e| BrokerError::ChannelUnavailable(e.to_string()))?;

        match guard.as_ref() {
            Some(channel) => channel
                .publish_persistent(queue, payload)
                .await
                .map_err(|e| BrokerError::ChannelUnavailable(e.to_string())),
            None => Err(BrokerError::ChannelUnavailable("no channel".into())),
        }
    }

    /// 关闭通道与连接 (幂等)
    pub async fn close(&self) -> BrokerResult<()> {
        let mut guard = self.inner.channel.lock().await;
        let result = match guard.take() {
            Some(channel) => channel.close().await,
            None => Ok(()),
        };
        self.set_state(ConnectionState::Disconnected { reason: None });
        if let Err(e) = &result {
            tracing::warn!(error = %e, "Broker close reported an error");
        }
        result
    }
}

#[async_trait]
impl OrderEventSink for EventPublisher {
    async fn publish_order(&self, event: OrderEvent, order: &Order) -> BrokerResult<()> {
        self.publish(event.queue(), order).await
    }
}
