//! 消息代理抽象
//!
//! ```text
//!        ┌────────────────────────┐
//!        │ BrokerConnector trait  │  ◄── 可插拔接口
//!        └───────────┬────────────┘
//!                    │ connect()
//!        ┌───────────▼────────────┐
//!        │  BrokerChannel trait   │  declare / publish / consume / close
//!        └───────────┬────────────┘
//!           ┌────────┴────────┐
//!           ▼                 ▼
//!     AmqpConnector     MemoryBroker
//!     (RabbitMQ)        (同进程)
//! ```

use async_trait::async_trait;
use futures::stream::BoxStream;
use shared::error::AppError;
use thiserror::Error;

/// Broker errors
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 用尽重试次数仍无法连接
    #[error("Broker unavailable after {attempts} attempts: {reason}")]
    Unavailable { attempts: u32, reason: String },

    /// 发布时无法建立/恢复通道
    #[error("Channel unavailable: {0}")]
    ChannelUnavailable(String),
}

impl From<BrokerError> for AppError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::Unavailable { .. } => AppError::broker_unavailable(err.to_string()),
            BrokerError::Serialization(_) => AppError::internal(err.to_string()),
            _ => AppError::channel_unavailable(err.to_string()),
        }
    }
}

pub type BrokerResult<T> = Result<T, BrokerError>;

/// 建立到代理的连接并打开一个通道
#[async_trait]
pub trait BrokerConnector: Send + Sync + std::fmt::Debug {
    async fn connect(&self) -> BrokerResult<Box<dyn BrokerChannel>>;
}

/// 单个连接 + 通道
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    /// 声明 durable 队列 (幂等)
    async fn declare_durable(&self, queue: &str) -> BrokerResult<()>;

    /// 以持久化模式发布，等待代理确认后返回
    async fn publish_persistent(&self, queue: &str, payload: &[u8]) -> BrokerResult<()>;

    /// 订阅队列，消息需要显式 ack
    async fn consume(&self, queue: &str, consumer_tag: &str) -> BrokerResult<DeliveryStream>;

    /// 先关闭通道再关闭连接
    async fn close(&self) -> BrokerResult<()>;

    fn is_open(&self) -> bool;
}

/// 确认 / 拒绝一条投递
#[async_trait]
pub trait DeliveryAcker: Send + Sync {
    async fn ack(&self) -> BrokerResult<()>;
    /// 拒绝且不重新入队 (无法解析的消息)
    async fn reject(&self) -> BrokerResult<()>;
}

/// 从队列收到的一条消息
pub struct Delivery {
    pub queue: String,
    pub payload: Vec<u8>,
    pub acker: Box<dyn DeliveryAcker>,
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("queue", &self.queue)
            .field("len", &self.payload.len())
            .finish()
    }
}

pub type DeliveryStream = BoxStream<'static, BrokerResult<Delivery>>;
