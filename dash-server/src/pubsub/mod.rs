//! 订单事件发布 / 消费
//!
//! - [`EventPublisher`] - durable 发布器 (单连接，单通道，统一重连策略)
//! - [`RetryPolicy`] - 启动连接、懒连接、relay 共用的重试策略
//! - [`BrokerConnector`] / [`BrokerChannel`] - 代理抽象
//! - [`AmqpConnector`] - RabbitMQ (lapin)
//! - [`MemoryBroker`] - 进程内代理

mod amqp;
pub mod broker;
pub mod memory;
mod publisher;
mod retry;

pub use amqp::AmqpConnector;
pub use broker::{
    BrokerChannel, BrokerConnector, BrokerError, BrokerResult, Delivery, DeliveryAcker,
    DeliveryStream,
};
pub use memory::MemoryBroker;
pub use publisher::{ConnectionState, EventPublisher, OrderEventSink};
pub use retry::RetryPolicy;
