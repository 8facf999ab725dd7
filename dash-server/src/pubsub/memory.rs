//! Memory 代理实现 (同进程通信)
//!
//! 用于 `BROKER_KIND=memory` 的单进程运行和测试。队列是无界 mpsc 通道，
//! 发布在消费者出现前会被缓存；同一队列的多个消费者互相竞争。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;

use super::broker::{
    BrokerChannel, BrokerConnector, BrokerError, BrokerResult, Delivery, DeliveryAcker,
    DeliveryStream,
};

/// 代理操作记录，测试中用于断言顺序
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerOp {
    Declare(String),
    Publish(String, Vec<u8>),
}

#[derive(Debug)]
struct MemoryQueue {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>>,
}

impl MemoryQueue {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
        }
    }
}

#[derive(Debug, Default)]
struct BrokerState {
    queues: HashMap<String, MemoryQueue>,
    journal: Vec<BrokerOp>,
}

#[derive(Debug)]
struct Inner {
    available: AtomicBool,
    /// 每次 set_available(false) 递增，旧连接随之失效
    generation: AtomicU64,
    connect_attempts: AtomicU32,
    state: Mutex<BrokerState>,
}

/// In-process broker
#[derive(Debug, Clone)]
pub struct MemoryBroker {
    inner: Arc<Inner>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                available: AtomicBool::new(true),
                generation: AtomicU64::new(0),
                connect_attempts: AtomicU32::new(0),
                state: Mutex::new(BrokerState::default()),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, BrokerState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 模拟代理宕机 / 恢复；宕机时现有连接全部失效
    pub fn set_available(&self, available: bool) {
        if !available {
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.available.store(available, Ordering::SeqCst);
    }

    pub fn connect_attempts(&self) -> u32 {
        self.inner.connect_attempts.load(Ordering::SeqCst)
    }

    /// 所有声明 / 发布操作 (按发生顺序)
    pub fn journal(&self) -> Vec<BrokerOp> {
        self.state().journal.clone()
    }

    /// 某队列上发布过的所有消息体
    pub fn published(&self, queue: &str) -> Vec<Vec<u8>> {
        self.state()
            .journal
            .iter()
            .filter_map(|op| match op {
                BrokerOp::Publish(q, payload) if q == queue => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }

    fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerConnector for MemoryBroker {
    async fn connect(&self) -> BrokerResult<Box<dyn BrokerChannel>> {
        self.inner.connect_attempts.fetch_add(1, Ordering::SeqCst);
        if !self.inner.available.load(Ordering::SeqCst) {
            return Err(BrokerError::Connect("connection refused".into()));
        }
        Ok(Box::new(MemoryChannel {
            broker: self.clone(),
            generation: self.generation(),
            closed: AtomicBool::new(false),
        }))
    }
}

struct MemoryChannel {
    broker: MemoryBroker,
    generation: u64,
    closed: AtomicBool,
}

impl MemoryChannel {
    fn ensure_open(&self) -> BrokerResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(BrokerError::Channel("channel closed".into()))
        }
    }
}

#[async_trait]
impl BrokerChannel for MemoryChannel {
    async fn declare_durable(&self, queue: &str) -> BrokerResult<()> {
        self.ensure_open()?;
        let mut state = self.broker.state();
        state
            .queues
            .entry(queue.to_string())
            .or_insert_with(MemoryQueue::new);
        state.journal.push(BrokerOp::Declare(queue.to_string()));
        Ok(())
    }

    async fn publish_persistent(&self, queue: &str, payload: &[u8]) -> BrokerResult<()> {
        self.ensure_open()?;
        let mut state = self.broker.state();
        let Some(q) = state.queues.get(queue) else {
            return Err(BrokerError::Publish(format!("queue {} not declared", queue)));
        };
        q.tx.send(payload.to_vec())
            .map_err(|e| BrokerError::Publish(e.to_string()))?;
        state
            .journal
            .push(BrokerOp::Publish(queue.to_string(), payload.to_vec()));
        Ok(())
    }

    async fn consume(&self, queue: &str, _consumer_tag: &str) -> BrokerResult<DeliveryStream> {
        self.ensure_open()?;
        let rx = {
            let state = self.broker.state();
            let q = state
                .queues
                .get(queue)
                .ok_or_else(|| BrokerError::Channel(format!("queue {} not declared", queue)))?;
            q.rx.clone()
        };
        let queue = queue.to_string();
        let stream = futures::stream::unfold((rx, queue), |(rx, queue)| async move {
            let payload = rx.lock().await.recv().await?;
            let delivery = Delivery {
                queue: queue.clone(),
                payload,
                acker: Box::new(NoopAcker),
            };
            Some((Ok(delivery), (rx, queue)))
        });
        Ok(stream.boxed())
    }

    async fn close(&self) -> BrokerResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
            && self.broker.inner.available.load(Ordering::SeqCst)
            && self.generation == self.broker.generation()
    }
}

/// 内存队列出队即完成，ack 无需回传
struct NoopAcker;

#[async_trait]
impl DeliveryAcker for NoopAcker {
    async fn ack(&self) -> BrokerResult<()> {
        Ok(())
    }

    async fn reject(&self) -> BrokerResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_requires_declared_queue() {
        let broker = MemoryBroker::new();
        let ch = broker.connect().await.unwrap();
        assert!(ch.publish_persistent("orders:new", b"{}").await.is_err());
        ch.declare_durable("orders:new").await.unwrap();
        ch.publish_persistent("orders:new", b"{}").await.unwrap();
        assert_eq!(
            broker.journal(),
            vec![
                BrokerOp::Declare("orders:new".into()),
                BrokerOp::Publish("orders:new".into(), b"{}".to_vec()),
            ]
        );
    }

    #[tokio::test]
    async fn test_buffered_until_consumed_in_order() {
        let broker = MemoryBroker::new();
        let ch = broker.connect().await.unwrap();
        ch.declare_durable("q").await.unwrap();
        for i in 0..3u8 {
            ch.publish_persistent("q", &[i]).await.unwrap();
        }
        let mut stream = ch.consume("q", "test").await.unwrap();
        for i in 0..3u8 {
            let d = stream.next().await.unwrap().unwrap();
            assert_eq!(d.payload, vec![i]);
            assert_eq!(d.queue, "q");
        }
    }

    #[tokio::test]
    async fn test_outage_invalidates_channels() {
        let broker = MemoryBroker::new();
        let ch = broker.connect().await.unwrap();
        assert!(ch.is_open());
        broker.set_available(false);
        assert!(!ch.is_open());
        assert!(broker.connect().await.is_err());
        broker.set_available(true);
        assert!(!ch.is_open());
        assert!(broker.connect().await.unwrap().is_open());
        assert_eq!(broker.connect_attempts(), 3);
    }
}
