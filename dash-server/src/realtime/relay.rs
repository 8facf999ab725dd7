//! OrderRelay - 代理队列 → OrderHub
//!
//! 独立的消费者连接，与发布器共用 [`RetryPolicy`]。每条投递解析为 [`Order`]，
//! 交给 hub 之后才 ack；无法解析的消息被拒绝（不重新入队）。

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use shared::Order;
use shared::message::ALL_QUEUES;
use tokio_util::sync::CancellationToken;

use super::OrderHub;
use crate::pubsub::{BrokerChannel, BrokerConnector, BrokerResult, Delivery, RetryPolicy};

/// 通道健康检查间隔
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(5);

pub struct OrderRelay {
    connector: Arc<dyn BrokerConnector>,
    policy: RetryPolicy,
    hub: OrderHub,
}

enum SessionEnd {
    Shutdown,
    Lost(String),
}

impl OrderRelay {
    pub fn new(connector: Arc<dyn BrokerConnector>, policy: RetryPolicy, hub: OrderHub) -> Self {
        Self {
            connector,
            policy,
            hub,
        }
    }

    /// Consume until `shutdown` fires, reconnecting on channel loss
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(queues = ?ALL_QUEUES, "Order relay started");

        loop {
            let connect = self.policy.run("Relay broker connect", |_| self.open_channel());
            let channel = tokio::select! {
                _ = shutdown.cancelled() => break,
                result = connect => match result {
                    Ok(channel) => channel,
                    Err((e, attempts)) => {
                        tracing::error!(attempts, error = %e, "Order relay could not reach broker, backing off");
                        tokio::select! {
                            _ = shutdown.cancelled() => break,
                            _ = tokio::time::sleep(self.policy.interval()) => continue,
                        }
                    }
                },
            };

            let end = self.consume(channel.as_ref(), &shutdown).await;
            if let Err(e) = channel.close().await {
                tracing::debug!(error = %e, "Relay channel close failed");
            }
            match end {
                SessionEnd::Shutdown => break,
                SessionEnd::Lost(reason) => {
                    tracing::warn!(reason = %reason, "Order relay lost broker channel, reconnecting");
                }
            }
        }

        tracing::info!("Order relay stopped");
    }

    async fn open_channel(&self) -> BrokerResult<Box<dyn BrokerChannel>> {
        let channel = self.connector.connect().await?;
        for queue in ALL_QUEUES {
            channel.declare_durable(queue).await?;
        }
        Ok(channel)
    }

    async fn consume(&self, channel: &dyn BrokerChannel, shutdown: &CancellationToken) -> SessionEnd {
        let mut streams = Vec::with_capacity(ALL_QUEUES.len());
        for queue in ALL_QUEUES {
            match channel.consume(queue, &format!("dash-relay:{}", queue)).await {
                Ok(stream) => streams.push(stream),
                Err(e) => return SessionEnd::Lost(e.to_string()),
            }
        }
        let mut deliveries = futures::stream::select_all(streams);

        let mut health = tokio::time::interval(HEALTH_CHECK_INTERVAL);
        health.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return SessionEnd::Shutdown,
                _ = health.tick() => {
                    if !channel.is_open() {
                        return SessionEnd::Lost("channel closed".into());
                    }
                }
                next = deliveries.next() => match next {
                    Some(Ok(delivery)) => self.handle(delivery).await,
                    Some(Err(e)) => return SessionEnd::Lost(e.to_string()),
                    None => return SessionEnd::Lost("consumer stream ended".into()),
                },
            }
        }
    }

    async fn handle(&self, delivery: Delivery) {
        match serde_json::from_slice::<Order>(&delivery.payload) {
            Ok(order) => {
                let order_id = order.id.clone();
                let receivers = self.hub.publish(order);
                tracing::debug!(queue = %delivery.queue, order_id = %order_id, receivers, "Order relayed");
                if let Err(e) = delivery.acker.ack().await {
                    tracing::warn!(queue = %delivery.queue, order_id = %order_id, error = %e, "Ack failed");
                }
            }
            Err(e) => {
                tracing::warn!(queue = %delivery.queue, error = %e, "Rejecting malformed order payload");
                if let Err(e) = delivery.acker.reject().await {
                    tracing::warn!(queue = %delivery.queue, error = %e, "Reject failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pubsub::{EventPublisher, MemoryBroker};
    use chrono::Utc;
    use shared::{OrderStatus, OrderType};

    fn order(id: &str, version: u64) -> Order {
        Order {
            id: id.into(),
            id_user: "u".into(),
            items: vec![],
            total_cost: 1.0,
            status: OrderStatus::Preparing,
            order_type: OrderType::Dinein,
            created_at: Utc::now(),
            updated_at: None,
            version,
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(10))
    }

    async fn recv(rx: &mut tokio::sync::broadcast::Receiver<Order>) -> Order {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("relay did not deliver in time")
            .unwrap()
    }

    #[tokio::test]
    async fn test_relays_both_queues_to_hub() {
        let broker = MemoryBroker::new();
        let hub = OrderHub::new();
        let mut rx = hub.subscribe();
        let shutdown = CancellationToken::new();

        let relay = OrderRelay::new(Arc::new(broker.clone()), policy(), hub.clone());
        let task = tokio::spawn(relay.run(shutdown.clone()));

        let publisher = EventPublisher::new(Arc::new(broker.clone()), policy());
        publisher.publish("orders:new", &order("o-1", 1)).await.unwrap();
        publisher
            .publish("orders:updated", &order("o-1", 2))
            .await
            .unwrap();

        let mut seen = vec![recv(&mut rx).await.version, recv(&mut rx).await.version];
        seen.sort();
        assert_eq!(seen, vec![1, 2]);

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_payload_is_skipped() {
        let broker = MemoryBroker::new();
        let hub = OrderHub::new();
        let mut rx = hub.subscribe();
        let shutdown = CancellationToken::new();

        let publisher = EventPublisher::new(Arc::new(broker.clone()), policy());
        publisher.publish("orders:new", "not an order").await.unwrap();
        publisher.publish("orders:new", &order("o-2", 1)).await.unwrap();

        let relay = OrderRelay::new(Arc::new(broker), policy(), hub);
        let task = tokio::spawn(relay.run(shutdown.clone()));

        assert_eq!(recv(&mut rx).await.id, "o-2");
        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_while_broker_down() {
        let broker = MemoryBroker::new();
        broker.set_available(false);
        let shutdown = CancellationToken::new();

        let relay = OrderRelay::new(Arc::new(broker.clone()), policy(), OrderHub::new());
        let task = tokio::spawn(relay.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(broker.connect_attempts() >= 3);
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
